/// Builds the gRPC client and server code for `proto/route_guide.proto` using
/// `tonic-prost-build`.
///
/// Generated code is emitted into the crate's `OUT_DIR` together with an
/// encoded file descriptor set (`route_guide_descriptor.bin`) that the server
/// registers with `tonic-reflection`.
///
/// # Extra derives
///
/// - `Point` and `Feature` derive `serde::Deserialize` so the feature
///   database (a JSON array of `{location, name}` records) parses straight
///   into wire types.
///
/// # Output
///
/// ```rust,ignore
/// pub mod proto {
///     tonic::include_proto!("routeguide");
/// }
/// ```
use std::env;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let descriptor_path = out_dir.join("route_guide_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config
        .type_attribute(".routeguide.Point", "#[derive(serde::Deserialize)]")
        .type_attribute(".routeguide.Feature", "#[derive(serde::Deserialize)]")
        .file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure().compile_with_config(
        config,
        &["proto/route_guide.proto"],
        &["proto"],
    )?;

    println!("cargo:rerun-if-changed=proto/route_guide.proto");
    Ok(())
}
