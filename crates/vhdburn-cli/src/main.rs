//! vhdburn CLI - inspect VHD images and burn MBR boot sectors

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use vhdburn_core::{format_size, ConfirmationPolicy, Error, ReadSeek};
use vhdburn_vaults::{BlockAllocationTable, VaultConfig, VhdImage};
use vhdburn_zones::{BootSector, BootSectorWriter, BurnOutcome};

#[derive(Parser)]
#[command(name = "vhdburn")]
#[command(about = "Inspect Microsoft VHD images and burn MBR boot sectors into them")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level
    #[arg(long, global = true, env = "RUST_LOG", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Command {
    /// Classify an image and print what was decoded
    Info {
        /// VHD image
        image: PathBuf,

        /// -v adds header fields, -vv adds BAT allocation counts
        #[arg(short, long, action = clap::ArgAction::Count)]
        verbose: u8,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Require a sparse disk type before treating an image as dynamic
        #[arg(long)]
        strict: bool,
    },

    /// Write boot code (up to 510 bytes) or a full 512-byte sector into a fixed image
    Burn {
        /// Boot sector payload
        payload: PathBuf,

        /// VHD image, modified in place
        image: PathBuf,

        /// Do not ask before writing
        #[arg(short, long)]
        force: bool,

        /// Require a sparse disk type before treating an image as dynamic
        #[arg(long)]
        strict: bool,
    },

    /// Exit with status 0 if the image is a recognized VHD
    Check {
        /// VHD image
        image: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(&cli.log_level)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Info {
            image,
            verbose,
            json,
            strict,
        } => cmd_info(&image, verbose, json, strict),
        Command::Burn {
            payload,
            image,
            force,
            strict,
        } => cmd_burn(&payload, &image, force, strict),
        Command::Check { image } => {
            if !cmd_check(&image)? {
                process::exit(1);
            }
            Ok(())
        }
    }
}

fn open_image(path: &Path, writable: bool) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(writable)
        .open(path)
        .with_context(|| format!("cannot open {}", path.display()))
}

fn cmd_info(path: &Path, verbose: u8, json: bool, strict: bool) -> Result<()> {
    let mut file = open_image(path, false)?;
    let image = VhdImage::classify(&mut file, &VaultConfig { strict_dynamic: strict })?;
    let summary = image.summary();

    let allocated = if verbose >= 2 {
        bat_allocation(&image, &mut file)?
    } else {
        None
    };

    let boot_signature = if image.is_fixed() {
        Some(BootSector::read_signature(&mut file)?)
    } else {
        None
    };

    if json {
        let mut value = serde_json::to_value(&summary)?;
        match &allocated {
            Some(BatAllocation::Counted { allocated, total }) => {
                value["bat_allocated_blocks"] = serde_json::Value::from(*allocated);
                value["bat_total_blocks"] = serde_json::Value::from(*total);
            }
            Some(BatAllocation::Unavailable(reason)) => {
                value["bat_allocated_blocks"] = serde_json::Value::Null;
                value["bat_allocation_error"] = serde_json::Value::from(reason.as_str());
            }
            None => {}
        }
        if let Some(sig) = boot_signature {
            value["boot_signature"] = serde_json::Value::from(format!("{:02X}{:02X}", sig[0], sig[1]));
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("=== Image Information ===");
    println!("Path:      {}", path.display());
    println!("Type:      {}", summary.variant);
    println!("Size:      {}", format_size(summary.file_len));
    println!("Fixed:     {}", summary.fixed);
    println!("Dynamic:   {}", summary.dynamic);

    if let Some(footer) = &summary.footer {
        println!();
        println!("=== Footer ===");
        println!("Disk type:     {}", footer.disk_type);
        println!("Current size:  {}", format_size(footer.current_size));
        println!("Original size: {}", format_size(footer.original_size));
        println!("Geometry:      {}", footer.geometry);
        println!("Data offset:   0x{:016X}", footer.data_offset);
        println!("Unique ID:     {}", footer.unique_id);
        match footer.timestamp {
            Some(ts) => println!("Created:       {}", ts.format("%Y-%m-%d %H:%M:%S UTC")),
            None => println!("Created:       unknown"),
        }
        println!(
            "Creator:       {} v{}.{} on {}",
            footer.creator_application,
            footer.creator_version >> 16,
            footer.creator_version & 0xFFFF,
            footer.creator_host_os
        );
        println!("Checksum:      0x{:08X}", footer.checksum);
    }

    if let Some(sig) = boot_signature {
        println!("Boot sig:      {:02X} {:02X}", sig[0], sig[1]);
    }

    if verbose >= 1 {
        if let Some(header) = &summary.header {
            println!();
            println!("=== Dynamic Header ===");
            println!("Table offset:  0x{:X}", header.table_offset);
            println!("BAT entries:   {}", header.max_table_entries);
            println!("BAT size:      {}", format_size(header.bat_byte_size));
            println!("Block size:    {}", format_size(header.block_size as u64));
            println!(
                "Version:       {}.{}",
                header.header_version >> 16,
                header.header_version & 0xFFFF
            );
            println!("Checksum:      0x{:08X}", header.checksum);
            if !header.parent_name.is_empty() {
                println!("Parent:        {}", header.parent_name);
                println!("Parent ID:     {}", header.parent_unique_id);
            }
        }
    }

    match allocated {
        Some(BatAllocation::Counted { allocated, total }) => {
            println!("Allocated:     {} of {} blocks", allocated, total)
        }
        Some(BatAllocation::Unavailable(reason)) => {
            println!("Allocated:     unavailable ({})", reason)
        }
        None => {}
    }

    Ok(())
}

/// Block usage read from the BAT
#[derive(Debug, PartialEq)]
enum BatAllocation {
    Counted { allocated: usize, total: usize },
    /// The table is too large to load; the rest of the report still prints
    Unavailable(String),
}

fn bat_allocation(image: &VhdImage, file: &mut dyn ReadSeek) -> Result<Option<BatAllocation>> {
    let Some(bat) = image.bat() else {
        return Ok(None);
    };

    match bat.read_entries(file) {
        Ok(entries) => Ok(Some(BatAllocation::Counted {
            allocated: BlockAllocationTable::allocated_count(&entries),
            total: entries.len(),
        })),
        Err(e @ Error::AllocationLimit(_)) => {
            tracing::warn!("Skipping BAT allocation count: {}", e);
            Ok(Some(BatAllocation::Unavailable(e.to_string())))
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_burn(payload_path: &Path, path: &Path, force: bool, strict: bool) -> Result<()> {
    let payload = fs::read(payload_path)
        .with_context(|| format!("cannot read {}", payload_path.display()))?;

    let mut file = open_image(path, true)?;
    let image = VhdImage::classify(&mut file, &VaultConfig { strict_dynamic: strict })?;
    tracing::debug!(variant = %image.variant(), "Burn target classified");

    let outcome = if force {
        let mut always = |_: &str| true;
        BootSectorWriter::burn_image(&mut file, &image, &payload, &mut always)?
    } else {
        let mut stdin = StdinConfirmation {
            image: path.display().to_string(),
        };
        BootSectorWriter::burn_image(&mut file, &image, &payload, &mut stdin)?
    };

    match outcome {
        BurnOutcome::Written(report) => {
            file.sync_all()
                .with_context(|| format!("cannot sync {}", path.display()))?;
            println!(
                "Wrote {} byte payload to {} at offset {}",
                report.payload_len,
                path.display(),
                report.offset
            );
            for warning in &report.warnings {
                eprintln!("Warning: {}", warning);
            }
        }
        BurnOutcome::WriteSkipped => println!("Nothing written."),
    }

    Ok(())
}

fn cmd_check(path: &Path) -> Result<bool> {
    let mut file = open_image(path, false)?;
    let image = VhdImage::classify(&mut file, &VaultConfig::default())?;
    println!("{}: {}", path.display(), image.variant());
    Ok(image.variant().is_recognized())
}

/// Asks on the terminal before the boot sector is overwritten
struct StdinConfirmation {
    image: String,
}

impl ConfirmationPolicy for StdinConfirmation {
    fn confirm(&mut self, question: &str) -> bool {
        tracing::debug!("{}", question);
        let prompt = format!("Overwrite boot sector of {}? (y/n) ", self.image);
        match ask(&mut io::stdin().lock(), &mut io::stdout(), &prompt) {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!("Cannot read answer: {}", e);
                false
            }
        }
    }
}

/// Repeat `prompt` until the answer is y, yes, n or no. End of input declines.
fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> io::Result<bool> {
    let mut line = String::new();
    loop {
        write!(output, "{}", prompt)?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Ok(false);
        }

        match line.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Cursor;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_burn_flags() {
        let cli = Cli::try_parse_from(["vhdburn", "burn", "-f", "boot.bin", "disk.vhd"]).unwrap();
        match cli.command {
            Command::Burn { force, strict, payload, image } => {
                assert!(force);
                assert!(!strict);
                assert_eq!(payload, PathBuf::from("boot.bin"));
                assert_eq!(image, PathBuf::from("disk.vhd"));
            }
            _ => panic!("expected burn"),
        }
    }

    #[test]
    fn test_info_verbosity() {
        let cli = Cli::try_parse_from(["vhdburn", "info", "-vv", "disk.vhd"]).unwrap();
        assert!(matches!(cli.command, Command::Info { verbose: 2, .. }));
    }

    /// Footer copy, header with `entries` BAT entries, BAT, trailing footer
    fn dynamic_image(entries: u32, bat: &[u8]) -> Vec<u8> {
        let mut footer = [0u8; 512];
        footer[0..8].copy_from_slice(b"conectix");
        footer[16..24].copy_from_slice(&512u64.to_be_bytes());
        footer[60..64].copy_from_slice(&3u32.to_be_bytes());

        let mut header = [0u8; 1024];
        header[0..8].copy_from_slice(b"cxsparse");
        header[16..24].copy_from_slice(&1536u64.to_be_bytes());
        header[28..32].copy_from_slice(&entries.to_be_bytes());

        let mut image = footer.to_vec();
        image.extend_from_slice(&header);
        image.extend_from_slice(bat);
        image.extend_from_slice(&footer);
        image
    }

    #[test]
    fn test_bat_allocation_counted() {
        let mut bat = vec![0xFFu8; 16];
        bat[4..8].copy_from_slice(&4u32.to_be_bytes());
        let mut cursor = Cursor::new(dynamic_image(4, &bat));
        let image = VhdImage::classify(&mut cursor, &VaultConfig::default()).unwrap();

        assert_eq!(
            bat_allocation(&image, &mut cursor).unwrap(),
            Some(BatAllocation::Counted { allocated: 1, total: 4 })
        );
    }

    #[test]
    fn test_bat_allocation_over_limit_is_unavailable() {
        let mut cursor = Cursor::new(dynamic_image(u32::MAX, &[]));
        let image = VhdImage::classify(&mut cursor, &VaultConfig::default()).unwrap();
        assert!(image.is_dynamic());

        let result = bat_allocation(&image, &mut cursor).unwrap();
        assert!(matches!(result, Some(BatAllocation::Unavailable(msg)) if msg.contains("BAT")));
    }

    #[test]
    fn test_bat_allocation_fixed_image_has_none() {
        let mut footer = [0u8; 512];
        footer[0..8].copy_from_slice(b"conectix");
        footer[16..24].copy_from_slice(&u64::MAX.to_be_bytes());
        footer[60..64].copy_from_slice(&2u32.to_be_bytes());
        let mut data = vec![0u8; 1024];
        data.extend_from_slice(&footer);
        let mut cursor = Cursor::new(data);
        let image = VhdImage::classify(&mut cursor, &VaultConfig::default()).unwrap();

        assert_eq!(bat_allocation(&image, &mut cursor).unwrap(), None);
    }

    #[test]
    fn test_ask_yes() {
        let mut out = Vec::new();
        assert!(ask(&mut Cursor::new("Yes\n"), &mut out, "? ").unwrap());
        assert_eq!(out, b"? ");
    }

    #[test]
    fn test_ask_repeats_until_valid() {
        let mut out = Vec::new();
        let answer = ask(&mut Cursor::new("maybe\n\nn\n"), &mut out, "? ").unwrap();
        assert!(!answer);
        assert_eq!(out, b"? ? ? ");
    }

    #[test]
    fn test_ask_eof_declines() {
        let mut out = Vec::new();
        assert!(!ask(&mut Cursor::new(""), &mut out, "? ").unwrap());
    }
}
