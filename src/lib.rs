//! boxconv: bounding-box annotation converter.
//!
//! Converts single-image object detection labels between YOLO text files,
//! Pascal VOC XML and COCO JSON. Each format has a codec under [`ir`];
//! [`conversion`] chains them through integer pixel corners.
//!
//! # Modules
//!
//! - [`ir`]: box geometry, class tables and the three format codecs
//! - [`conversion`]: format-to-format transforms and conversion reports
//! - [`error`]: error types for boxconv operations

pub mod conversion;
pub mod error;
pub mod ir;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use conversion::{CategoryMapping, ConversionReport, DimensionSource};
use ir::io_coco_json::CocoWriteOptions;
use ir::io_voc_xml::VocObjectDefaults;
use ir::io_yolo::YoloWriteOptions;
use ir::{ClassTable, EmptyPolicy, ImageId};

pub use error::BoxconvError;

/// The boxconv CLI application.
#[derive(Parser)]
#[command(name = "boxconv")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a YOLO label file to Pascal VOC XML.
    YoloToVoc(YoloToVocArgs),
    /// Convert a Pascal VOC XML file to single-image COCO JSON.
    VocToCoco(VocToCocoArgs),
    /// Convert a COCO JSON file to a YOLO label file.
    CocoToYolo(CocoToYoloArgs),
    /// Convert a Pascal VOC XML file to a YOLO label file.
    VocToYolo(VocToYoloArgs),
}

/// Class names, inline or from a `classes.txt` / `data.yaml` file.
#[derive(clap::Args)]
#[group(required = true, multiple = false)]
struct ClassArgs {
    /// Comma-separated class names in class-id order.
    #[arg(long, value_name = "NAMES")]
    classes: Option<String>,

    /// classes.txt (one name per line) or data.yaml (`names:` key).
    #[arg(long, value_name = "FILE")]
    classes_file: Option<PathBuf>,
}

impl ClassArgs {
    fn load(&self) -> Result<ClassTable, BoxconvError> {
        match (&self.classes, &self.classes_file) {
            (Some(list), _) => ClassTable::from_delimited(list),
            (None, Some(path)) => ClassTable::from_file(path),
            (None, None) => Err(BoxconvError::InvalidClassTable(
                "one of --classes or --classes-file is required".to_string(),
            )),
        }
    }
}

#[derive(clap::Args)]
struct CommonArgs {
    /// Output file.
    #[arg(short, long)]
    output: PathBuf,

    /// Accept inputs that contain no boxes.
    #[arg(long)]
    allow_empty: bool,

    /// Print the conversion report to stdout.
    #[arg(long, value_enum, value_name = "FORMAT")]
    report: Option<ReportFormat>,
}

impl CommonArgs {
    fn empty_policy(&self) -> EmptyPolicy {
        if self.allow_empty {
            EmptyPolicy::Allow
        } else {
            EmptyPolicy::Reject
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum MappingArg {
    /// class_id = category_id - 1
    Offset,
    /// class_id = rank of category_id among the sorted categories
    Ordinal,
}

impl From<MappingArg> for CategoryMapping {
    fn from(arg: MappingArg) -> Self {
        match arg {
            MappingArg::Offset => CategoryMapping::Offset,
            MappingArg::Ordinal => CategoryMapping::Ordinal,
        }
    }
}

#[derive(clap::Args)]
struct YoloToVocArgs {
    /// YOLO label file.
    input: PathBuf,

    /// Image width in pixels.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    width: u32,

    /// Image height in pixels.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    height: u32,

    #[command(flatten)]
    classes: ClassArgs,

    /// Image file name written as <filename>.
    #[arg(long)]
    filename: Option<String>,

    /// Value written to every <pose>.
    #[arg(long, default_value = "Unspecified")]
    pose: String,

    /// Value written to every <truncated>.
    #[arg(long, default_value_t = 0)]
    truncated: u8,

    /// Value written to every <difficult>.
    #[arg(long, default_value_t = 0)]
    difficult: u8,

    /// Value written to <size><depth>.
    #[arg(long, default_value_t = ir::DEFAULT_IMAGE_DEPTH)]
    depth: u32,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(clap::Args)]
struct VocToCocoArgs {
    /// Pascal VOC XML file.
    input: PathBuf,

    #[command(flatten)]
    classes: ClassArgs,

    /// Id of the single image record.
    #[arg(long, default_value_t = 1)]
    image_id: u64,

    /// iscrowd written on every annotation.
    #[arg(long, default_value_t = 0)]
    iscrowd: u8,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(clap::Args)]
struct CocoToYoloArgs {
    /// COCO JSON file.
    input: PathBuf,

    /// Image width used to normalize every box.
    #[arg(
        long,
        required_unless_present = "use_record_dims",
        requires = "height",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    width: Option<u32>,

    /// Image height used to normalize every box.
    #[arg(
        long,
        required_unless_present = "use_record_dims",
        requires = "width",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    height: Option<u32>,

    /// Normalize by the size of the image record each annotation references.
    #[arg(long, conflicts_with_all = ["width", "height"])]
    use_record_dims: bool,

    /// How category ids become class ids.
    #[arg(long, value_enum, default_value = "offset")]
    category_mapping: MappingArg,

    /// Fixed number of decimals for coordinates.
    #[arg(long)]
    precision: Option<usize>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(clap::Args)]
struct VocToYoloArgs {
    /// Pascal VOC XML file.
    input: PathBuf,

    #[command(flatten)]
    classes: ClassArgs,

    /// Fixed number of decimals for coordinates.
    #[arg(long)]
    precision: Option<usize>,

    #[command(flatten)]
    common: CommonArgs,
}

/// Run the boxconv CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), BoxconvError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::YoloToVoc(args)) => run_yolo_to_voc(args),
        Some(Commands::VocToCoco(args)) => run_voc_to_coco(args),
        Some(Commands::CocoToYolo(args)) => run_coco_to_yolo(args),
        Some(Commands::VocToYolo(args)) => run_voc_to_yolo(args),
        None => {
            println!("boxconv {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Bounding-box annotation converter for YOLO, Pascal VOC and COCO.");
            println!();
            println!("Run 'boxconv --help' for usage information.");
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    // A logger may already be installed when run() is driven from tests.
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .try_init();
}

fn run_yolo_to_voc(args: YoloToVocArgs) -> Result<(), BoxconvError> {
    let classes = args.classes.load()?;
    let options = conversion::YoloToVocOptions {
        file_name: args.filename,
        depth: args.depth,
        objects: VocObjectDefaults {
            pose: args.pose,
            truncated: args.truncated,
            difficult: args.difficult,
        },
        empty: args.common.empty_policy(),
    };
    let report = conversion::yolo_to_pascal_voc(
        &args.input,
        args.width,
        args.height,
        &classes,
        &args.common.output,
        &options,
    )?;
    print_report(&report, args.common.report)
}

fn run_voc_to_coco(args: VocToCocoArgs) -> Result<(), BoxconvError> {
    let classes = args.classes.load()?;
    let options = conversion::VocToCocoOptions {
        coco: CocoWriteOptions {
            image_id: ImageId::new(args.image_id),
            iscrowd: args.iscrowd,
        },
        empty: args.common.empty_policy(),
    };
    let report =
        conversion::pascal_voc_to_coco(&args.input, &classes, &args.common.output, &options)?;
    print_report(&report, args.common.report)
}

fn run_coco_to_yolo(args: CocoToYoloArgs) -> Result<(), BoxconvError> {
    let dimensions = match (args.width, args.height) {
        (Some(width), Some(height)) if !args.use_record_dims => {
            DimensionSource::Explicit { width, height }
        }
        _ => DimensionSource::FromRecord,
    };
    let options = conversion::CocoToYoloOptions {
        category_mapping: args.category_mapping.into(),
        yolo: YoloWriteOptions {
            precision: args.precision,
        },
        empty: args.common.empty_policy(),
    };
    let report =
        conversion::coco_to_yolo(&args.input, dimensions, &args.common.output, &options)?;
    print_report(&report, args.common.report)
}

fn run_voc_to_yolo(args: VocToYoloArgs) -> Result<(), BoxconvError> {
    let classes = args.classes.load()?;
    let options = conversion::VocToYoloOptions {
        yolo: YoloWriteOptions {
            precision: args.precision,
        },
        empty: args.common.empty_policy(),
    };
    let report =
        conversion::pascal_voc_to_yolo(&args.input, &classes, &args.common.output, &options)?;
    print_report(&report, args.common.report)
}

fn print_report(
    report: &ConversionReport,
    format: Option<ReportFormat>,
) -> Result<(), BoxconvError> {
    for issue in report
        .issues
        .iter()
        .filter(|i| i.severity == conversion::ConversionSeverity::Warning)
    {
        log::warn!("{}", issue.message);
    }

    match format {
        None => {}
        Some(ReportFormat::Text) => print!("{report}"),
        Some(ReportFormat::Json) => {
            let json = serde_json::to_string_pretty(report).map_err(|source| {
                BoxconvError::JsonWrite {
                    path: PathBuf::from("<stdout>"),
                    source,
                }
            })?;
            println!("{json}");
        }
    }
    Ok(())
}
