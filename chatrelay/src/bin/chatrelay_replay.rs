// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

// chatrelay-replay: run a captured agent SSE body through the re-framer.
//
// Usage:
//   chatrelay-replay capture.sse
//   chatrelay-replay --config chatrelay.yaml --policy accept_all capture.sse
//   curl -sN ... | chatrelay-replay --chunk-size 7

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use chatrelay::config::{
    self, ConfigSource, FileSource, PartialPolicyKind, StringSource, DEFAULT_CONFIG_YAML,
};
use chatrelay::stream::{parse_frame, policy_for, AdkEventClassifier, ReEncoder, SseDecoder};

#[derive(Parser)]
#[command(
    name = "chatrelay-replay",
    about = "Replay a captured agent SSE stream and print the data-stream frames it produces."
)]
struct Cli {
    /// Captured SSE body. Reads stdin when omitted.
    input: Option<PathBuf>,

    /// Config file supplying the stream section (default: built-in defaults).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the configured partial policy.
    #[arg(long, value_name = "POLICY", value_parser = parse_policy)]
    policy: Option<PartialPolicyKind>,

    /// Feed the decoder this many bytes at a time (0 = whole input at once).
    #[arg(long, default_value_t = 0)]
    chunk_size: usize,

    /// Parse every emitted frame back the way the client does.
    #[arg(long)]
    check: bool,
}

fn parse_policy(s: &str) -> Result<PartialPolicyKind, String> {
    s.parse()
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(io::stderr)
        .init();

    let source: Box<dyn ConfigSource> = match &cli.config {
        Some(path) => Box::new(FileSource::new(path)),
        None => Box::new(StringSource::new(DEFAULT_CONFIG_YAML)),
    };
    let config = match config::load_config(source.as_ref()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(source = %source.describe(), "failed to load config: {e}");
            std::process::exit(1);
        }
    };

    let input = match read_input(cli.input.as_ref()) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!("failed to read input: {e}");
            std::process::exit(1);
        }
    };

    let policy_kind = cli.policy.unwrap_or(config.stream.partial_policy);
    let mut reencoder = ReEncoder::new(
        Arc::new(AdkEventClassifier::from_config(&config.stream)),
        policy_for(policy_kind),
    );
    let mut decoder = SseDecoder::new().with_max_record_bytes(config.stream.max_record_bytes);

    let chunk_size = if cli.chunk_size == 0 {
        input.len().max(1)
    } else {
        cli.chunk_size
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let check_failures = match replay(
        &input,
        chunk_size,
        &mut decoder,
        &mut reencoder,
        cli.check,
        &mut out,
    ) {
        Ok(n) => n,
        Err(e) => {
            tracing::error!("failed to write output: {e}");
            std::process::exit(1);
        }
    };

    let decoded = decoder.finish();
    let encoded = reencoder.into_stats();
    tracing::info!(
        policy = %policy_kind,
        input_bytes = input.len(),
        chunk_size,
        records = decoded.records,
        events = decoded.events,
        parse_failures = decoded.parse_failures,
        skipped_records = decoded.skipped,
        discarded_tail_bytes = decoded.discarded_tail_bytes,
        oversized_records = decoded.oversized_records,
        text_frames = encoded.text_frames,
        annotation_frames = encoded.annotation_frames,
        dropped_unrecognized = encoded.dropped_unrecognized,
        dropped_by_policy = encoded.dropped_by_policy,
        "replay finished"
    );

    if check_failures > 0 {
        tracing::error!(check_failures, "frame check failed");
        std::process::exit(2);
    }
}

/// Feed `input` through the decoder and re-encoder in `chunk_size` pieces,
/// writing each frame to `out`. Returns the number of frames that failed
/// the round-trip check.
fn replay<W: Write>(
    input: &[u8],
    chunk_size: usize,
    decoder: &mut SseDecoder,
    reencoder: &mut ReEncoder,
    check: bool,
    out: &mut W,
) -> io::Result<usize> {
    let mut check_failures = 0usize;

    for chunk in input.chunks(chunk_size.max(1)) {
        for event in decoder.push(chunk) {
            let Some(frame) = reencoder.handle(&event) else {
                continue;
            };
            let line = frame.encode();
            if check {
                let parsed = std::str::from_utf8(&line)
                    .map_err(|e| e.to_string())
                    .and_then(|s| parse_frame(s).map_err(|e| e.to_string()));
                match parsed {
                    Ok(back) if back == frame => {}
                    Ok(_) => {
                        check_failures += 1;
                        tracing::warn!(frame = frame.kind(), "frame parsed back differently");
                    }
                    Err(e) => {
                        check_failures += 1;
                        tracing::warn!(frame = frame.kind(), "frame failed to parse: {e}");
                    }
                }
            }
            out.write_all(&line)?;
        }
    }
    out.flush()?;
    Ok(check_failures)
}

fn read_input(path: Option<&PathBuf>) -> io::Result<Vec<u8>> {
    match path {
        Some(path) => std::fs::read(path),
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}
