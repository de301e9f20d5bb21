use clap::Parser;
use mediabatch_lib::cli::Args;
use mediabatch_lib::core::error::BatchError;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    mediabatch_lib::init_tracing(args.log_directive());

    if let Err(e) = mediabatch_lib::run(args).await {
        tracing::error!("{:#}", e);
        let code = match e.downcast_ref::<BatchError>() {
            Some(err) if err.is_fatal() => 2,
            _ => 1,
        };
        std::process::exit(code);
    }
}
