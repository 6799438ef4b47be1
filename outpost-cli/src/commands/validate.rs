// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 The Outpost Authors

//! `outpost validate` command - Validate configuration file.

use outpost_core::ConfigLoader;

pub async fn execute(file: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(file = %file, "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Domain Settings:");
            println!("  Name:                 {}", config.name);
            println!(
                "  Attach Timeout:       {}ms",
                config.options.attach_timeout.as_millis()
            );
            match config.options.call_timeout {
                Some(timeout) => {
                    println!("  Call Timeout:         {}ms", timeout.as_millis())
                }
                None => println!("  Call Timeout:         disabled"),
            }
            println!(
                "  Max Frame Size:       {} bytes",
                config.options.max_frame_bytes
            );
            println!(
                "  Parent Poll Interval: {}ms",
                config.options.parent_poll_interval.as_millis()
            );
            println!(
                "  Runtime Directory:    {}",
                config.options.runtime_dir.display()
            );
            match &config.worker_path {
                Some(path) => println!("  Worker Binary:        {}", path.display()),
                None => println!("  Worker Binary:        (resolved at launch)"),
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
