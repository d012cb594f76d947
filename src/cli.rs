use crate::*;
use std::io::Read;
use std::path::Path;

#[cfg(feature = "bin")]
pub mod bin {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    #[command(version = env!("FULL_VERSION"), about = env!("CARGO_PKG_DESCRIPTION"))]
    struct Args {
        /// The tactic files to lower. Reads standard input when none are given
        inputs: Vec<PathBuf>,
        /// Writes the builder records to this file instead of standard output
        #[clap(short = 'o', long)]
        output: Option<PathBuf>,
        /// Omits the generated-file comment at the top of the output
        #[clap(long)]
        no_header: bool,
        /// Number of spaces before each builder line
        #[clap(long, default_value = "2")]
        indent: usize,
    }

    /// Start the command-line interface.
    #[allow(clippy::disallowed_macros)]
    pub fn cli() {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Info)
            .format_timestamp(None)
            .format_target(false)
            .parse_default_env()
            .init();

        let args = Args::parse();
        let mut emitter = Emitter::new(EmitConfig {
            header: !args.no_header,
            indent: args.indent,
        });

        let result = if args.inputs.is_empty() {
            log::debug!("Reading tactics from standard input");
            compile_from(&mut emitter, std::io::stdin())
        } else {
            compile_files(&mut emitter, &args.inputs)
        };
        let text = match result {
            Ok(text) => text,
            Err(err) => {
                log::error!("{err}");
                std::process::exit(1)
            }
        };

        match &args.output {
            Some(path) => {
                if let Err(err) = std::fs::write(path, text) {
                    log::error!("{}", Error::IoError(path.clone(), err));
                    std::process::exit(1)
                }
                log::info!("Wrote {}", path.display());
            }
            None => print!("{text}"),
        }
    }
}

/// Lowers several files into one output. All files are parsed before anything
/// is emitted, so a parse error anywhere produces no output.
pub fn compile_files(emitter: &mut Emitter, paths: &[impl AsRef<Path>]) -> Result<String, Error> {
    let mut tactics = vec![];
    for path in paths {
        let path = path.as_ref();
        let program = std::fs::read_to_string(path)
            .map_err(|err| Error::IoError(path.to_path_buf(), err))?;
        tactics.extend(parse_program(
            Some(path.to_string_lossy().into_owned()),
            &program,
        )?);
    }
    let mut out = String::new();
    emitter.emit_program(&tactics, &mut out)?;
    Ok(out)
}

pub fn compile_from(emitter: &mut Emitter, mut input: impl Read) -> Result<String, Error> {
    let mut program = String::new();
    input
        .read_to_string(&mut program)
        .map_err(|err| Error::IoError(PathBuf::from("<stdin>"), err))?;
    emitter.parse_and_emit_program(None, &program)
}
