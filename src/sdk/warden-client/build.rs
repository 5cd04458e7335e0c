use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let proto_files = [PathBuf::from("proto/warden/identity/v1/identity.proto")];

    // Fall back to the vendored protoc so builds do not need a system install.
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }
    let wkt_include = protoc_bin_vendored::include_path()?;

    tonic_prost_build::configure()
        .btree_map(".")
        .build_server(true)
        .build_client(true)
        .compile_protos(
            &proto_files,
            &[PathBuf::from("proto"), wkt_include],
        )?;

    for proto in proto_files {
        println!("cargo:rerun-if-changed={}", proto.display());
    }
    Ok(())
}
