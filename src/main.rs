use clap::Parser;

fn main() -> anyhow::Result<()> {
    let cfg = fidoverify::config::Config::parse();
    fidoverify::run(cfg)
}
