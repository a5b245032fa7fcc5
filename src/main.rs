use anyhow::Context;
use clap::{Parser, Subcommand};
use scriptkit::tools::convert::{self, ConversionOutcome, ImageConverter};
use scriptkit::tools::covid::{self, InsertOutcome, Scraper, SqliteWarehouse};
use scriptkit::tools::otp_qr::{self, OtpAlgorithm, OtpKey, OtpKind};
use scriptkit::tools::{duplicates, ip_region, md5_match};
use scriptkit::utils::http::build_client;
use scriptkit::Config;
use std::path::PathBuf;

/// A small collection of independent command-line utilities
#[derive(Parser, Debug)]
#[command(name = "scriptkit", version, about, long_about = None)]
struct Args {
    /// Path to a TOML config file (defaults to ./scriptkit.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find the AWS region that owns an IP address
    IpRegion {
        /// IPv4 or IPv6 address to look up
        ip: String,

        /// Print every matching prefix instead of only the first
        #[arg(short, long)]
        all: bool,

        /// Read the ranges document from a local file instead of downloading it
        #[arg(long)]
        ranges_file: Option<PathBuf>,
    },
    /// Convert every image in a directory to another format
    Convert {
        /// Directory holding the images to convert
        #[arg(default_value = convert::DEFAULT_SOURCE_DIR)]
        source: PathBuf,

        /// Target file extension, e.g. .png or .tiff
        #[arg(default_value = convert::DEFAULT_TARGET_EXT)]
        target_ext: String,

        /// Directory under which a timestamped output folder is created
        #[arg(short, long, default_value = convert::DEFAULT_TARGET_DIR)]
        target_dir: PathBuf,
    },
    /// Report whether a list of integers contains a repeated value
    HasDup {
        /// Integers to check (defaults to a sample list)
        #[arg(allow_negative_numbers = true)]
        ints: Vec<i64>,
    },
    /// Generate a QR code for provisioning an authenticator app
    OtpQr {
        /// Key type
        #[arg(value_enum)]
        kind: OtpKind,
        /// Label, usually the account provider
        label: String,
        /// Account name
        user: String,
        /// Base32 shared secret
        secret: String,
        /// Issuer name
        issuer: String,
        /// Output image path
        #[arg(default_value = "otpauth_qr.png")]
        output: PathBuf,

        /// Initial counter, required for hotp keys
        #[arg(long)]
        counter: Option<u64>,

        /// Number of digits in each code
        #[arg(long)]
        digits: Option<u8>,

        /// Code lifetime in seconds (totp)
        #[arg(long)]
        period: Option<u32>,

        /// HMAC algorithm
        #[arg(long, value_enum)]
        algorithm: Option<OtpAlgorithm>,

        /// Do not open the image once it is written
        #[arg(long)]
        no_show: bool,
    },
    /// Recover single characters from their MD5 digests
    Md5Match {
        /// Hex digests to resolve (defaults to a sample set)
        digests: Vec<String>,

        /// Characters that may have produced the digests
        #[arg(short, long, default_value = md5_match::DEFAULT_ALPHABET)]
        alphabet: String,
    },
    /// Scrape NI and IE COVID-19 figures and store today's row
    Covid {
        /// Only print the scraped figures, do not touch the warehouse
        #[arg(long)]
        dry_run: bool,
    },
}

async fn run(args: Args, config: Config) -> anyhow::Result<()> {
    match args.command {
        Commands::IpRegion {
            ip,
            all,
            ranges_file,
        } => {
            let ranges = match ranges_file {
                Some(path) => ip_region::load_ip_ranges(&path)?,
                None => {
                    let client = build_client(&config.http)?;
                    ip_region::fetch_ip_ranges(&client, &config.ip_ranges.url).await?
                }
            };

            let matches = ip_region::lookup(&ranges, &ip)?;
            if all {
                for record in &matches {
                    println!(
                        "IP address: {}, Subnet: {}, Region: {}, Service: {}, Border group: {}.",
                        ip,
                        record.ip_prefix,
                        record.region,
                        record.service,
                        record.network_border_group
                    );
                }
            } else {
                let first = matches[0];
                println!(
                    "IP address: {}, Subnet: {}, Region: {}.",
                    ip, first.ip_prefix, first.region
                );
            }
        }
        Commands::Convert {
            source,
            target_ext,
            target_dir,
        } => {
            let converter = ImageConverter::new(&source, &target_ext, &target_dir)?;
            let output_dir = converter.output_dir().to_path_buf();
            let outcomes = tokio::task::spawn_blocking(move || converter.convert_all())
                .await
                .context("conversion task panicked")??;

            let mut failed = 0;
            for outcome in &outcomes {
                match outcome {
                    ConversionOutcome::Converted { target, .. } => {
                        println!("{} converted successfully", target.display())
                    }
                    ConversionOutcome::Skipped { source, reason } => {
                        println!("Skipped {}: {}", source.display(), reason)
                    }
                    ConversionOutcome::Failed { source, error } => {
                        failed += 1;
                        eprintln!("Failed {}: {}", source.display(), error)
                    }
                }
            }
            println!("Output directory: {}", output_dir.display());
            if failed > 0 {
                let total = outcomes
                    .iter()
                    .filter(|o| !matches!(o, ConversionOutcome::Skipped { .. }))
                    .count();
                return Err(scriptkit::Error::ConversionFailed { failed, total }.into());
            }
        }
        Commands::HasDup { ints } => {
            let ints = if ints.is_empty() {
                duplicates::SAMPLE.to_vec()
            } else {
                ints
            };
            println!("{}", duplicates::has_duplicate(&ints));

            let repeated = duplicates::find_duplicates(&ints);
            if !repeated.is_empty() {
                let listed: Vec<String> = repeated.iter().map(|n| n.to_string()).collect();
                println!("Repeated: {}", listed.join(", "));
            }
        }
        Commands::OtpQr {
            kind,
            label,
            user,
            secret,
            issuer,
            output,
            counter,
            digits,
            period,
            algorithm,
            no_show,
        } => {
            let mut key = OtpKey::new(kind, label, user, secret, issuer);
            key.counter = counter;
            key.digits = digits;
            key.period = period;
            key.algorithm = algorithm;

            let uri = otp_qr::generate(&key, &output)?;
            println!("QR Code: {} generated in: {}.", key.label, output.display());
            println!("{}", uri);
            if !no_show {
                otp_qr::show(&output)?;
            }
        }
        Commands::Md5Match { digests, alphabet } => {
            let table = md5_match::DigestTable::from_alphabet(&alphabet);
            let matches = if digests.is_empty() {
                table.resolve(&md5_match::SAMPLE_DIGESTS)?
            } else {
                table.resolve(&digests)?
            };

            for m in &matches {
                match m {
                    md5_match::DigestMatch::Matched { digest, character } => {
                        println!("{} => {}", digest, character)
                    }
                    md5_match::DigestMatch::Unmatched { digest } => {
                        println!("{} => (no match)", digest)
                    }
                }
            }
            println!("Text: {}", md5_match::recovered_text(&matches));
        }
        Commands::Covid { dry_run } => {
            let client = build_client(&config.http)?;
            let scraper = Scraper::new(client, &config.covid.ni_url, &config.covid.ie_url);
            let today = chrono::Local::now().date_naive();

            if dry_run {
                let figures = scraper.fetch_updates().await?;
                println!(
                    "NI_Confirmed: {}, IE_Confirmed: {}",
                    figures.ni_confirmed, figures.ie_confirmed
                );
                return Ok(());
            }

            let warehouse = SqliteWarehouse::from_config(&config.warehouse);
            let (record, schema, outcome) = covid::update(&scraper, &warehouse, today).await?;

            if schema.created_dataset {
                println!("Created dataset {}", warehouse.dataset_id());
            }
            if schema.created_table {
                println!("Table {} created.", warehouse.table_id());
            }
            match outcome {
                InsertOutcome::Inserted => println!(
                    "Added NI_Confirmed: {}, IE_Confirmed: {} to table: {}.",
                    record.ni_confirmed, record.ie_confirmed, config.warehouse.table
                ),
                InsertOutcome::AlreadyPresent => println!(
                    "A record for {} already exists in table: {}.",
                    record.date, config.warehouse.table
                ),
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.kind().exit_code());
        }
    };
    config.init_logging(args.verbose);

    if let Err(err) = run(args, config).await {
        eprintln!("Error: {:#}", err);
        let code = err
            .downcast_ref::<scriptkit::Error>()
            .map_or(1, |e| e.kind().exit_code());
        std::process::exit(code);
    }
}
