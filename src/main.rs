use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::PathBuf,
};

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;

mod config;
mod encode;

use config::EncodeConfig;

/// Encode raw packed UYVY video through the PAC plug-in.
#[derive(Debug, Parser)]
#[command(name = "pac-encode", version)]
struct Args {
    /// Raw UYVY 4:2:2 input, frames stored back to back
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Destination for the encoded packets
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// JSON file with defaults for every other flag
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    codec: Option<String>,

    /// Chunk size of the in-process reference library
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Abort on the first picture that overflows the output buffer
    #[arg(long)]
    fail_on_overflow: bool,
}

impl Args {
    fn into_config(self) -> anyhow::Result<EncodeConfig> {
        let mut config = match self.config {
            Some(ref path) => EncodeConfig::load(path)?,
            None => EncodeConfig::default(),
        };
        if let Some(input) = self.input {
            config.input = Some(input);
        }
        if let Some(output) = self.output {
            config.output = Some(output);
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(codec) = self.codec {
            config.codec = codec;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        config.fail_on_overflow |= self.fail_on_overflow;
        Ok(config)
    }
}

fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .filter_module("pac_bus", log::LevelFilter::Info)
        .filter_module("pac_encode", log::LevelFilter::Info)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    #[cfg(feature = "ffmpeg")]
    pac_bus::init()?;

    let config = Args::parse().into_config()?;
    let input = config.input.clone().context("no input file given")?;
    let output = config.output.clone().context("no output file given")?;

    let registry = pac_bus::default_registry(config.chunk_size);
    let mut encoder = registry.open(&config.codec, &config.settings())?;
    log::info!(
        "encoding {} -> {} with {} at {}x{}",
        input.display(),
        output.display(),
        config.codec,
        config.width,
        config.height
    );

    let reader = BufReader::new(
        File::open(&input).with_context(|| format!("opening {}", input.display()))?,
    );
    let writer = BufWriter::new(
        File::create(&output).with_context(|| format!("creating {}", output.display()))?,
    );

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let (width, height) = (config.width, config.height);
    let mut handle = tokio::task::spawn_blocking(move || {
        encode::encode_stream(encoder.as_mut(), width, height, reader, writer, &cancel_clone)
    });

    let stats = loop {
        tokio::select! {
            res = &mut handle => break res??,
            _ = tokio::signal::ctrl_c() => {
                log::info!("ctrl+c received, stopping");
                cancel.cancel();
            },
        }
    };

    log::info!(
        "done: {} frames, {} packets, {} bytes",
        stats.frames,
        stats.packets,
        stats.bytes
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("pac.json");
        std::fs::write(&path, r#"{ "width": 320, "height": 240, "chunk_size": 512 }"#)?;

        let args = Args::try_parse_from([
            "pac-encode",
            "--config",
            path.to_str().unwrap(),
            "--width",
            "640",
            "-i",
            "in.uyvy",
            "--fail-on-overflow",
        ])?;
        let config = args.into_config()?;
        assert_eq!(config.width, 640);
        assert_eq!(config.height, 240);
        assert_eq!(config.chunk_size, 512);
        assert_eq!(config.input, Some(PathBuf::from("in.uyvy")));
        assert!(config.output.is_none());
        assert!(config.fail_on_overflow);
        Ok(())
    }

    #[test]
    fn test_defaults_without_config() -> anyhow::Result<()> {
        let config = Args::try_parse_from(["pac-encode"])?.into_config()?;
        assert_eq!(config, EncodeConfig::default());
        Ok(())
    }
}
