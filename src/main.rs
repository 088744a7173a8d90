//! Inspect xtc trajectories through their dense coordinate arrays.
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::error;
use xtcdense::{Adapter, FrameTemplate, Options, ScanMode, XtcCodec};

#[derive(Parser)]
#[command(version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the number of atoms and frames in a trajectory.
    Info {
        /// Input path (xtc).
        path: PathBuf,
    },

    /// Print the positions of all atoms in one frame, one atom per line.
    Show {
        /// Input path (xtc).
        path: PathBuf,

        /// Index of the frame to print, starting at zero.
        #[arg(short, long, default_value_t = 0)]
        frame: usize,
    },

    /// Load a trajectory and write it out again.
    ///
    /// The written frames carry only the positions of the input. Steps are renumbered from 1, and
    /// the time and box are zero.
    Copy {
        /// Input path (xtc).
        input: PathBuf,

        /// Output path (xtc).
        output: PathBuf,

        /// Fail on a frame that cannot be read, instead of stopping there.
        #[arg(long)]
        strict: bool,

        /// Precision of the compressed positions that are written.
        #[arg(short, long, default_value_t = FrameTemplate::default().precision)]
        precision: f32,
    },
}

fn main() -> Result<ExitCode, xtcdense::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match args.command {
        Command::Info { path } => {
            let adapter = Adapter::new(XtcCodec);
            let natoms = adapter.probe_atom_count(&path)?;
            let nframes = adapter.count_frames(&path, natoms)?;
            println!("atoms:\t{natoms}");
            println!("frames:\t{nframes}");
        }
        Command::Show { path, frame } => {
            let dense = Adapter::new(XtcCodec).load(&path)?;
            if frame >= dense.frames_read() {
                error!(
                    "frame {frame} is out of range, '{}' holds {} frames",
                    path.display(),
                    dense.frames_read()
                );
                return Ok(ExitCode::FAILURE);
            }
            let mut stdout = std::io::stdout().lock();
            for position in dense.positions(frame) {
                let [x, y, z] = position.to_array();
                if writeln!(stdout, "{x:.3}\t{y:.3}\t{z:.3}").is_err() {
                    // The reader of our output went away.
                    break;
                }
            }
        }
        Command::Copy {
            input,
            output,
            strict,
            precision,
        } => {
            let options = Options {
                scan: if strict {
                    ScanMode::Strict
                } else {
                    ScanMode::Lenient
                },
                template: FrameTemplate {
                    precision,
                    ..FrameTemplate::default()
                },
            };
            let adapter = Adapter::with_options(XtcCodec, options);
            let dense = adapter.load(&input)?;
            let report = adapter.write_trajectory(&output, &dense)?;
            for (index, err) in report.failures() {
                eprintln!("frame {index}: {err}");
            }
            if let Err(err) = report.close_status() {
                eprintln!("closing '{}': {err}", output.display());
            }
            if !report.is_ok() {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
