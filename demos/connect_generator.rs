use clap::{arg, command};
use fungen::{FunctionGenerator, SessionOptions, DEFAULT_RESOURCE};
use std::time::Duration;

#[tokio::main]
async fn main() -> fungen::Result<()> {
    env_logger::init();
    let matches = command!()
        .arg(arg!(-r --resource <ADDRESS> "VISA resource address").default_value(DEFAULT_RESOURCE))
        .get_matches();
    let resource = matches
        .get_one::<String>("resource")
        .map(String::as_str)
        .unwrap_or(DEFAULT_RESOURCE);

    let options = SessionOptions::default().with_timeout(Duration::from_secs(10));
    let mut dev = FunctionGenerator::open(resource, options).await?;
    let id = dev.id().await?;
    eprintln!("Connected to: {} {} ({})\n", id.manufacturer, id.model, id.serial);
    println!("Function:  {:?}", dev.function().await?);
    println!("Frequency: {} Hz", dev.frequency().await?);
    println!("Amplitude: {}", dev.amplitude().await?);
    println!("Output:    {}", if dev.output().await? { "ON" } else { "OFF" });
    dev.close().await
}
