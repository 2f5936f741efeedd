#[tokio::main]
async fn main() {
    oktv_server::init_logger();
    oktv_server::run_server().await;
}
