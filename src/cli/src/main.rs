use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{bail, eyre};
use fifteen_core::{Board, Difficulty, ROW_SIZE, SIZE};
use fifteen_solver::{
    tables::{Partition, PatternDb},
    PatternPreset, Solver, SolverBuilder, Strategy, Verdict,
};
use itertools::Itertools;
use owo_colors::OwoColorize;

/// Optimally solves 15-puzzle boards
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Directory for precomputed tables and the reference board archive
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find an optimal solution for a board
    Solve {
        /// Sixteen tile values, 0 for the blank, row by row
        tiles: Vec<u8>,
        /// Solve a randomly generated board instead
        #[arg(long, conflicts_with = "tiles")]
        random: Option<DifficultyArg>,
        #[arg(long, value_enum, default_value_t = StrategyArg::WalkingManhattan)]
        strategy: StrategyArg,
        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Search without the archive of previously solved hard boards
        #[arg(long)]
        no_reference: bool,
        /// Search without mirror-symmetry pruning
        #[arg(long)]
        no_symmetry: bool,
        /// Search without the rotation limiter
        #[arg(long)]
        no_rotation_limit: bool,
    },
    /// Print the lower-bound estimate for a board without solving it
    Estimate {
        /// Sixteen tile values, 0 for the blank, row by row
        tiles: Vec<u8>,
        #[arg(long, value_enum, default_value_t = StrategyArg::WalkingManhattan)]
        strategy: StrategyArg,
    },
    /// Build a pattern database ahead of time
    Tables {
        #[arg(value_enum)]
        preset: PresetArg,
    },
    /// Inspect or maintain the reference board archive
    Reference {
        #[command(subcommand)]
        command: ReferenceCommands,
    },
}

#[derive(Subcommand)]
enum ReferenceCommands {
    /// Show how many boards are archived and how many are fully verified
    Status,
    /// Solve the unverified move classes of every archived board
    Verify,
    /// Drop all learned boards, keeping the built-in ones
    Reset,
    /// Set how long a solve must take before its board is archived
    Cutoff {
        /// Seconds, 1 through 10
        seconds: u32,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Manhattan,
    Conflict,
    Walking,
    WalkingManhattan,
    Pattern663,
    Pattern555,
    PatternWalking663,
    PatternWalking555,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Manhattan => Strategy::Manhattan,
            StrategyArg::Conflict => Strategy::ManhattanConflict,
            StrategyArg::Walking => Strategy::Walking,
            StrategyArg::WalkingManhattan => Strategy::WalkingManhattan,
            StrategyArg::Pattern663 => Strategy::Pattern(PatternPreset::SixSixThree),
            StrategyArg::Pattern555 => Strategy::Pattern(PatternPreset::FiveFiveFive),
            StrategyArg::PatternWalking663 => {
                Strategy::PatternWalking(PatternPreset::SixSixThree)
            }
            StrategyArg::PatternWalking555 => {
                Strategy::PatternWalking(PatternPreset::FiveFiveFive)
            }
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum DifficultyArg {
    Easy,
    Moderate,
    Hard,
}

impl From<DifficultyArg> for Difficulty {
    fn from(arg: DifficultyArg) -> Self {
        match arg {
            DifficultyArg::Easy => Difficulty::Easy,
            DifficultyArg::Moderate => Difficulty::Moderate,
            DifficultyArg::Hard => Difficulty::Hard,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PresetArg {
    #[value(name = "663")]
    SixSixThree,
    #[value(name = "555")]
    FiveFiveFive,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    pretty_env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Solve {
            tiles,
            random,
            strategy,
            timeout,
            no_reference,
            no_symmetry,
            no_rotation_limit,
        } => {
            let board = match random {
                Some(difficulty) => Board::random_with(difficulty.into()),
                None => board_from_args(&tiles)?,
            };
            let solver = SolverBuilder::new(strategy.into())
                .timeout(timeout.map(Duration::from_secs))
                .reference(!no_reference)
                .symmetry(!no_symmetry)
                .rotation_limit(!no_rotation_limit)
                .data_dir(cli.data_dir)
                .build()?;
            solve(&solver, &board)?;
        }
        Commands::Estimate { tiles, strategy } => {
            let board = board_from_args(&tiles)?;
            let solver = SolverBuilder::new(strategy.into())
                .data_dir(cli.data_dir)
                .build()?;
            match solver.heuristic_value(&board) {
                Some(plain) => {
                    println!("estimate: {}", plain.to_string().cyan());
                    if let Some(boosted) = solver.boosted_value(&board) {
                        if boosted > plain {
                            println!("boosted:  {}", boosted.to_string().cyan());
                        }
                    }
                }
                None => println!("{}", "This board cannot be solved.".red()),
            }
        }
        Commands::Tables { preset } => {
            let dir = cli
                .data_dir
                .ok_or_else(|| eyre!("--data-dir is required to store the table"))?;
            let (partition, name) = match preset {
                PresetArg::SixSixThree => (Partition::preset_663(), "pattern-663.db"),
                PresetArg::FiveFiveFive => (Partition::preset_555(), "pattern-555.db"),
            };
            std::fs::create_dir_all(&dir)?;
            println!("Generating the pattern database, this takes a while...");
            let db = PatternDb::generate(partition);
            db.save(&dir.join(name))?;
            println!("{} {}", "Saved".green(), dir.join(name).display());
        }
        Commands::Reference { command } => {
            let solver = SolverBuilder::new(Strategy::WalkingManhattan)
                .data_dir(cli.data_dir)
                .build()?;
            match command {
                ReferenceCommands::Status => {
                    if let Some((total, verified, cutoff)) = solver.reference_stats() {
                        println!("archived boards: {total}");
                        println!("fully verified:  {verified}");
                        println!("archive cutoff:  {cutoff}s");
                    }
                }
                ReferenceCommands::Verify => {
                    let verified = solver.verify_reference_pending();
                    println!("verified {verified} move classes");
                }
                ReferenceCommands::Reset => {
                    solver.reset_reference();
                    println!("dropped all learned boards");
                }
                ReferenceCommands::Cutoff { seconds } => {
                    solver.set_reference_cutoff(seconds);
                    println!("archive cutoff set to {}s", seconds.clamp(1, 10));
                }
            }
        }
    }

    Ok(())
}

fn board_from_args(tiles: &[u8]) -> color_eyre::Result<Board> {
    if tiles.len() != SIZE {
        bail!(
            "expected {SIZE} tile values, got {} (use --random to generate a board)",
            tiles.len()
        );
    }
    let mut values = [0; SIZE];
    values.copy_from_slice(tiles);
    Ok(Board::new(values)?)
}

fn solve(solver: &Solver, board: &Board) -> color_eyre::Result<()> {
    print_board(board);
    println!("strategy: {}", solver.strategy());

    let summary = solver.solve(board)?;
    match &summary.verdict {
        Verdict::Solved(moves) => {
            println!(
                "{} in {} moves ({} nodes, {:.2?}, estimate {})",
                "Solved".green(),
                moves.len(),
                summary.nodes,
                summary.elapsed,
                summary.estimate,
            );
            if !moves.is_empty() {
                println!("{}", moves.iter().join(" "));
            }
        }
        Verdict::Unsolvable => println!("{}", "This board cannot be solved.".red()),
        Verdict::TimedOut => println!(
            "{} after {} nodes in {:.2?}",
            "Timed out".red(),
            summary.nodes,
            summary.elapsed,
        ),
    }
    Ok(())
}

fn print_board(board: &Board) {
    for row in board.tiles().chunks(ROW_SIZE) {
        let line = row
            .iter()
            .map(|&tile| {
                if tile == 0 {
                    "  .".to_owned()
                } else {
                    format!("{tile:>3}")
                }
            })
            .join(" ");
        println!("{line}");
    }
}
