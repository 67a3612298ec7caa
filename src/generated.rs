pub mod session {
    tonic::include_proto!("session");
}
