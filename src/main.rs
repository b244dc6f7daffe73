#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sales_analytics_api::cli::run_with_sys_args().await
}
