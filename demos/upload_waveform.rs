use clap::{arg, command, value_parser};
use fungen::{FunctionGenerator, SessionOptions, UploadOptions, Waveform, DEFAULT_RESOURCE};
use std::time::Duration;

#[tokio::main]
async fn main() -> fungen::Result<()> {
    env_logger::init();
    let matches = command!()
        .arg(arg!(-r --resource <ADDRESS> "VISA resource address").default_value(DEFAULT_RESOURCE))
        .arg(
            arg!(-s --"sample-rate" <RATE> "Sample rate in Sa/s")
                .default_value("100")
                .value_parser(value_parser!(f64)),
        )
        .arg(arg!(--output "Switch the output on after upload"))
        .get_matches();
    let resource = matches
        .get_one::<String>("resource")
        .map(String::as_str)
        .unwrap_or(DEFAULT_RESOURCE);
    let sample_rate = matches.get_one::<f64>("sample-rate").copied().unwrap_or(100.0);

    // Random samples, one second at 100 Sa/s.
    let samples: Vec<f64> = (0..100).map(|_| rand::random::<f64>()).collect();
    let waveform = Waveform::from_volts(samples, sample_rate)?;

    let options = SessionOptions::default().with_timeout(Duration::from_secs(10));
    let mut dev = FunctionGenerator::open(resource, options).await?;
    dev.clear_volatile().await?;
    let upload = UploadOptions::default()
        .with_toggle_output(matches.get_flag("output"))
        .with_apply_amplitude(true);
    dev.upload(&waveform, &upload).await?;
    dev.check_errors().await?;
    eprintln!(
        "Uploaded {} samples at {} Sa/s",
        waveform.samples().len(),
        waveform.sample_rate()
    );
    dev.close().await
}
