use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::env;
use std::process::ExitCode;
use vertexgen::{
    logger::{self, LogLevel, LoggerConfig},
    VertexClient, VertexConfig,
};

fn usage() {
    eprintln!("usage: vertexgen [--image <file>]... <prompt>");
}

/// Split command line into reference image files and the prompt text.
fn parse_args(args: impl Iterator<Item = String>) -> Result<(Vec<String>, String), String> {
    let mut images = Vec::new();
    let mut words = Vec::new();
    let mut args = args;

    while let Some(arg) = args.next() {
        if arg == "--image" || arg == "-i" {
            let path = args
                .next()
                .ok_or_else(|| format!("{} requires a file path", arg))?;
            images.push(path);
        } else {
            words.push(arg);
        }
    }

    let prompt = words.join(" ").trim().to_string();
    if prompt.is_empty() {
        return Err("missing prompt".to_string());
    }
    Ok((images, prompt))
}

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv_loaded = dotenv::dotenv().is_ok();

    let level = if env::var("VERTEX_DEBUG").is_ok() {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    if let Err(e) = logger::init_with_config(LoggerConfig::new().with_level(level)) {
        eprintln!("{}", e);
    }

    if dotenv_loaded {
        log::info!("✅ .env file loaded");
    } else {
        log::warn!("⚠️  No .env file found, using system environment variables");
    }

    let (image_files, prompt) = match parse_args(env::args().skip(1)) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("error: {}", e);
            usage();
            return ExitCode::from(2);
        }
    };

    let config = VertexConfig::from_env();
    logger::log_config_info(&config);

    let mut reference_images = Vec::new();
    for file in &image_files {
        match tokio::fs::read(file).await {
            Ok(bytes) => reference_images.push(STANDARD.encode(bytes)),
            Err(e) => {
                log::error!("❌ Cannot read reference image {}: {}", file, e);
                return ExitCode::FAILURE;
            }
        }
    }

    let client = match VertexClient::new(config) {
        Ok(client) => client,
        Err(e) => {
            log::error!("❌ Failed to initialize client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match client.generate(prompt, reference_images).await.into_parts() {
        (Some(url), Some(path)) => {
            log::info!("🖼️  {}", url);
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        _ => {
            log::error!("❌ Image generation failed, check configuration and network");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn test_parse_args() {
        let (images, prompt) =
            parse_args(args(&["--image", "a.png", "a", "cat", "-i", "b.jpg", "wearing a hat"]))
                .unwrap();
        assert_eq!(images, vec!["a.png", "b.jpg"]);
        assert_eq!(prompt, "a cat wearing a hat");
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(parse_args(args(&[])).is_err());
        assert!(parse_args(args(&["--image"])).is_err());
        assert!(parse_args(args(&["--image", "a.png"])).is_err());
    }
}
