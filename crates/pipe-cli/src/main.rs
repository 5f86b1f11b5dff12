//! Pipe Inspect - консольные демо осмотра труб
//!
//! Четыре независимые команды с общими именами файлов:
//! `generate-qr` пишет `barcode.jpg`, `scan` и `inspect` его читают,
//! `preprocess` и `inspect` читают `input.jpg`.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pipe_core::{InspectionConfig, InspectionError};

/// Аргументы командной строки
#[derive(Parser, Debug)]
#[command(author, version, about = "Pipe inspection workflow demos", long_about = None)]
pub struct Cli {
    /// JSON-файл с порогами, параметрами QR или справочником труб
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Записать идентификатор трубы в QR-изображение
    GenerateQr {
        /// Кодируемое значение
        #[arg(short, long, default_value = "PIPE12345")]
        data: String,

        /// Выходное изображение
        #[arg(short, long, default_value = "barcode.jpg")]
        output: PathBuf,
    },

    /// Прочитать QR-метку, найти трубу в справочнике и обвести код
    Scan {
        /// Изображение с QR-кодом
        #[arg(short, long, default_value = "barcode.jpg")]
        input: PathBuf,

        /// Размеченное выходное изображение
        #[arg(short, long, default_value = "barcode_result.jpg")]
        output: PathBuf,
    },

    /// Сохранить все стадии поиска дефектов (01_resized ... 07_bboxes)
    Preprocess {
        /// Изображение поверхности
        #[arg(short, long, default_value = "input.jpg")]
        input: PathBuf,

        /// Каталог для изображений стадий
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Прочитать метку, найти дефекты и вывести команду маркировщику
    Inspect {
        /// Изображение поверхности
        #[arg(short, long, default_value = "input.jpg")]
        input: PathBuf,

        /// Изображение с QR-кодом
        #[arg(short, long, default_value = "barcode.jpg")]
        barcode: PathBuf,

        /// Каталог для выходных изображений
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Сохранить отчёт осмотра в JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::init_from_env(env);

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            log::info!("Loading configuration from {}", path.display());
            InspectionConfig::from_json_file(path)?
        }
        None => InspectionConfig::default(),
    };

    let result = match cli.command {
        Command::GenerateQr { data, output } => commands::generate_qr(&config, &data, &output),
        Command::Scan { input, output } => commands::scan(&config, &input, &output),
        Command::Preprocess { input, out_dir } => commands::preprocess(&config, &input, &out_dir),
        Command::Inspect {
            input,
            barcode,
            out_dir,
            report,
        } => commands::inspect(&config, &input, &barcode, &out_dir, report.as_deref()),
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => match e.downcast_ref::<InspectionError>() {
            Some(InspectionError::ImageNotFound(path)) => {
                println!("❌ {} not found.", path.display());
                Ok(ExitCode::FAILURE)
            }
            Some(InspectionError::NoQrCode) => {
                println!("❌ No QR code detected. Try a clearer QR image.");
                Ok(ExitCode::FAILURE)
            }
            _ => Err(e),
        },
    }
}
