use anyhow::{Context, Result, bail};
use clap::{Args, Parser};
use proto_bridge_core::{
    CodecConfig, GenericRecord, ProtobufCodec, Registry, SchemaSource, SchemaVersion,
};
use std::io::{BufRead, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "proto-bridge")]
#[command(about = "Convert pipeline event records between JSON and Protocol Buffers", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Decode protobuf payloads into JSON records (one JSON object per line)
    Decode {
        /// Input file with binary payload(s), or '-' for stdin
        #[arg(value_name = "INPUT")]
        input: String,

        #[command(flatten)]
        schema: SchemaArgs,

        /// Input carries varint length-delimited message boundaries
        #[arg(long)]
        length_delimited: bool,

        /// Fail on undecodable payloads instead of emitting fallback records
        #[arg(long)]
        stop_on_decode_error: bool,

        /// Attach oneof selection metadata under "@metadata"
        #[arg(long)]
        oneof_metadata: bool,

        /// Show detailed progress information
        #[arg(short, long)]
        verbose: bool,
    },

    /// Encode JSON-lines records into protobuf payloads
    Encode {
        /// Input file with one JSON record per line, or '-' for stdin
        #[arg(value_name = "INPUT")]
        input: String,

        /// Output file for the binary payload(s)
        #[arg(short, long, default_value = "./records.pb")]
        output: PathBuf,

        #[command(flatten)]
        schema: SchemaArgs,

        /// Prefix each message with a varint length
        #[arg(long)]
        length_delimited: bool,

        /// Disable the automatic type conversion retry
        #[arg(long)]
        no_autoconvert: bool,

        /// Silently drop record keys that have no schema field
        #[arg(long)]
        drop_unknown_fields: bool,

        /// Show detailed progress information
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Fully-qualified message type name (e.g. "zoo.Unicorn")
    #[arg(short, long)]
    class_name: String,

    /// Self-contained schema artifact file(s); repeatable
    #[arg(long = "descriptor-file")]
    descriptor_files: Vec<PathBuf>,

    /// Root schema artifact whose declared dependencies are resolved
    /// against --descriptor-root
    #[arg(long)]
    root_artifact: Option<PathBuf>,

    /// Include directory for resolving root artifact dependencies
    #[arg(long)]
    descriptor_root: Option<PathBuf>,

    /// Schema artifacts use the legacy (proto2) representation
    #[arg(long)]
    legacy: bool,
}

impl SchemaArgs {
    fn source(&self) -> Result<SchemaSource> {
        if !self.descriptor_files.is_empty() {
            if self.root_artifact.is_some() {
                bail!("--descriptor-file and --root-artifact are mutually exclusive");
            }
            return Ok(SchemaSource::Files(self.descriptor_files.clone()));
        }
        match &self.root_artifact {
            Some(root) => {
                let include_root = self
                    .descriptor_root
                    .clone()
                    .context("--root-artifact requires --descriptor-root")?;
                Ok(SchemaSource::Root {
                    file: root.clone(),
                    include_root,
                })
            }
            None => bail!("one of --descriptor-file or --root-artifact is required"),
        }
    }

    fn version(&self) -> SchemaVersion {
        if self.legacy {
            SchemaVersion::Legacy
        } else {
            SchemaVersion::Modern
        }
    }
}

#[derive(Debug, Default)]
struct Stats {
    total: u64,
    converted: u64,
    failed: u64,
}

impl Stats {
    fn print_summary(&self, direction: &str) {
        println!("\n{direction} summary:");
        println!("  Records processed: {}", self.total);
        println!("  Converted:         {}", self.converted);
        println!("  Failed:            {}", self.failed);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Decode {
            input,
            schema,
            length_delimited,
            stop_on_decode_error,
            oneof_metadata,
            verbose,
        } => {
            init_logging(verbose);
            let config = CodecConfig::new(schema.class_name.clone(), schema.source()?)
                .schema_version(schema.version())
                .length_delimited(length_delimited)
                .stop_on_decode_error(stop_on_decode_error)
                .oneof_metadata(oneof_metadata);
            decode_input(&input, config)?;
        }
        Commands::Encode {
            input,
            output,
            schema,
            length_delimited,
            no_autoconvert,
            drop_unknown_fields,
            verbose,
        } => {
            init_logging(verbose);
            let config = CodecConfig::new(schema.class_name.clone(), schema.source()?)
                .schema_version(schema.version())
                .length_delimited(length_delimited)
                .autoconvert_types(!no_autoconvert)
                .drop_unknown_fields(drop_unknown_fields);
            encode_input(&input, &output, config, length_delimited)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::filter::LevelFilter;

    let filter = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn read_input_bytes(input: &str) -> Result<Vec<u8>> {
    if input == "-" {
        let mut bytes = Vec::new();
        std::io::stdin()
            .read_to_end(&mut bytes)
            .context("reading stdin")?;
        Ok(bytes)
    } else {
        std::fs::read(input).with_context(|| format!("reading {input}"))
    }
}

fn decode_input(input: &str, config: CodecConfig) -> Result<()> {
    let registry = Arc::new(Registry::new());
    let codec = ProtobufCodec::new(config, &registry)?;
    info!("Decoding {} as {}", input, codec.type_name());

    let bytes = read_input_bytes(input)?;
    let decoded = codec.decode(&bytes)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut stats = Stats::default();
    for message in &decoded {
        stats.total += 1;
        let mut json = serde_json::to_value(&message.record)?;
        if let Some(selection) = &message.oneofs {
            if let serde_json::Value::Object(object) = &mut json {
                object.insert(
                    "@metadata".to_string(),
                    serde_json::json!({ "pb_oneof": selection.to_json() }),
                );
            }
        }
        writeln!(out, "{json}")?;
        stats.converted += 1;
    }

    stats.print_summary("Decode");
    Ok(())
}

fn encode_input(
    input: &str,
    output: &PathBuf,
    config: CodecConfig,
    length_delimited: bool,
) -> Result<()> {
    let registry = Arc::new(Registry::new());
    let codec = ProtobufCodec::new(config, &registry)?;
    info!("Encoding {} as {}", input, codec.type_name());

    let lines: Vec<String> = if input == "-" {
        std::io::stdin()
            .lock()
            .lines()
            .collect::<std::io::Result<_>>()
            .context("reading stdin")?
    } else {
        let file = std::fs::File::open(input).with_context(|| format!("opening {input}"))?;
        std::io::BufReader::new(file)
            .lines()
            .collect::<std::io::Result<_>>()
            .with_context(|| format!("reading {input}"))?
    };

    let mut writer = std::io::BufWriter::new(
        std::fs::File::create(output).with_context(|| format!("creating {}", output.display()))?,
    );

    let mut stats = Stats::default();
    for (line_number, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        stats.total += 1;

        let record: GenericRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping line {}: invalid JSON: {}", line_number + 1, e);
                stats.failed += 1;
                continue;
            }
        };

        // A single bad record is dropped with a diagnostic; the stream
        // keeps going.
        match codec.encode(&record) {
            Ok(bytes) => {
                writer.write_all(&bytes)?;
                stats.converted += 1;
            }
            Err(e) => {
                warn!("Discarding record on line {}: {}", line_number + 1, e);
                stats.failed += 1;
            }
        }
    }
    writer.flush()?;

    if stats.converted > 1 && !length_delimited {
        warn!(
            "wrote {} messages without --length-delimited; boundaries are not recoverable",
            stats.converted
        );
    }

    stats.print_summary("Encode");
    Ok(())
}
