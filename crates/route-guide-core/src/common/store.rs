//! Immutable, in-memory feature database.
//!
//! The store is loaded once at startup from a JSON array of
//! `{"location": {"latitude": .., "longitude": ..}, "name": ..}` records and
//! is only read afterwards, so it can be shared behind an `Arc` without any
//! locking. Lookups are linear scans; the dataset is small.

use crate::{
    Error, Result,
    geo::Bounds,
    proto::{Feature, Point},
};
use std::{fs::File, io::Read, path::Path};

/// A feature "exists" when it has a name.
pub fn exists(feature: &Feature) -> bool {
    !feature.name.is_empty()
}

/// Result of a point lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    /// A named feature sits exactly at the queried point. `index` is its
    /// position in the store and identifies it within a route.
    Found { index: usize, feature: &'a Feature },
    /// Nothing named is known at the point.
    Missing,
}

impl Lookup<'_> {
    /// Converts the lookup into its wire form: the stored feature, or a
    /// feature with an empty name at `point`.
    pub fn into_feature(self, point: &Point) -> Feature {
        match self {
            Lookup::Found { feature, .. } => feature.clone(),
            Lookup::Missing => Feature {
                name: String::new(),
                location: Some(point.clone()),
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeatureStore {
    features: Vec<Feature>,
}

impl FeatureStore {
    /// Parses a feature database from `reader`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dataset`] if the input is not a JSON array of
    /// features or if any record lacks a location.
    pub fn load<R: Read>(reader: R) -> Result<Self> {
        let features: Vec<Feature> = serde_json::from_reader(reader)
            .map_err(|e| Error::dataset(format!("malformed feature database: {e}")))?;

        if let Some(index) = features.iter().position(|f| f.location.is_none()) {
            return Err(Error::dataset(format!("record {index} has no location")));
        }

        Ok(Self { features })
    }

    /// Opens and parses the feature database at `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::dataset(format!("cannot open {}: {e}", path.display())))?;
        let store = Self::load(std::io::BufReader::new(file))?;

        tracing::info!(
            path = %path.display(),
            features = store.len(),
            named = store.iter().filter(|f| exists(f)).count(),
            "Loaded feature database"
        );
        Ok(store)
    }

    pub const fn from_features(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Index of the first stored feature located exactly at `point`, named
    /// or not.
    pub fn position(&self, point: &Point) -> Option<usize> {
        self.features
            .iter()
            .position(|f| f.location.as_ref() == Some(point))
    }

    /// Looks up the named feature at `point`.
    pub fn lookup(&self, point: &Point) -> Lookup<'_> {
        match self.position(point) {
            Some(index) if exists(&self.features[index]) => Lookup::Found {
                index,
                feature: &self.features[index],
            },
            _ => Lookup::Missing,
        }
    }

    /// Returns the feature at `point`, or an unnamed feature at `point` when
    /// none is known. Never fails.
    pub fn get_feature(&self, point: &Point) -> Feature {
        self.lookup(point).into_feature(point)
    }

    /// Lazily yields the named features inside `bounds`, in store order.
    pub fn list_features(&self, bounds: Bounds) -> impl Iterator<Item = &Feature> + '_ {
        self.features.iter().filter(move |f| {
            exists(f) && f.location.as_ref().is_some_and(|p| bounds.contains(p))
        })
    }
}
