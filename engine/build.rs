use tonic_build::manual::{Builder, Method, Service};

const MESSAGES: &str = "crate::demo::messages";
const CODEC: &str = "tonic::codec::ProstCodec";

fn method(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("{MESSAGES}::{input}"))
        .output_type(format!("{MESSAGES}::{output}"))
        .codec_path(CODEC)
        .build()
}

fn main() {
    // Messages are hand-written prost structs, so only the service and client
    // stubs are generated here; no protoc is required.
    let list = Method::builder()
        .name("list")
        .route_name("List")
        .input_type(format!("{MESSAGES}::AccountListRequest"))
        .output_type(format!("{MESSAGES}::Account"))
        .codec_path(CODEC)
        .server_streaming()
        .build();

    let account_service = Service::builder()
        .name("AccountService")
        .package("modelrpc.demo")
        .method(method("create", "Create", "Account", "Account"))
        .method(list)
        .method(method(
            "retrieve",
            "Retrieve",
            "AccountLookupRequest",
            "Account",
        ))
        .method(method("update", "Update", "Account", "Account"))
        .method(method(
            "partial_update",
            "PartialUpdate",
            "AccountPartialUpdateRequest",
            "Account",
        ))
        .method(method("destroy", "Destroy", "AccountLookupRequest", "Empty"))
        .build();

    Builder::new().compile(&[account_service]);
    println!("cargo:rerun-if-changed=build.rs");
}
