use anyhow::anyhow;

mod app;
mod cli;
mod console;
mod env;
mod export;
mod render;

fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install rustls crypto provider"))?;

    let rt = pingboard_common::runtime::build_from_env()?;

    let result = rt.block_on(async {
        let cli = cli::parse();
        match cli.command {
            Some(cli::Commands::Start) | None => {
                pingboard_common::logger::init("pingboard");
                let config = env::init()?;
                app::start(config).await
            }
            Some(cli::Commands::Add(args)) => {
                pingboard_common::logger::init("pingboard");
                let config = env::init()?;
                app::add(config, &args.address).await
            }
            Some(cli::Commands::Import(args)) => {
                pingboard_common::logger::init("pingboard");
                let config = env::init()?;
                app::import(config, &args.file).await
            }
            Some(cli::Commands::Export(args)) => {
                pingboard_common::logger::init("pingboard");
                let config = env::init()?;
                app::export(config, args.output.as_deref()).await
            }
            Some(cli::Commands::Version) => {
                println!("{}", env::version());
                Ok(())
            }
        }
    });

    // a pending stdin read holds a blocking thread that never finishes
    rt.shutdown_background();
    result
}
