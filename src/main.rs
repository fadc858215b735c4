use clap::Parser;
use railtopo::{SectionKind, SourcePath, SourceRoute, TrackModel, TrackNode, TrainPath};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
/// Build a track model from route data and validate a train path against it
struct Cli {
    /// Route definition file (JSON)
    #[clap(long)]
    route: PathBuf,

    /// Path definition file (JSON); omit to only check the route
    #[clap(long)]
    path: Option<PathBuf>,

    /// Also print clean waypoints, not only flagged ones
    #[clap(long, short)]
    verbose: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> railtopo::Result<bool> {
    let route = SourceRoute::from_json_file(&cli.route)?;
    let model = TrackModel::build(&route)?;

    let mut junctions = 0usize;
    let mut end_nodes = 0usize;
    let mut sections = 0usize;
    for node in model.nodes() {
        match node {
            TrackNode::Junction(_) => junctions += 1,
            TrackNode::End(_) => end_nodes += 1,
            TrackNode::Section(_) => sections += 1,
        }
    }
    println!(
        "route {}: {} track nodes ({} sections, {} junctions, {} end nodes), {} segments",
        route.name.as_deref().unwrap_or("<unnamed>"),
        model.node_count(),
        sections,
        junctions,
        end_nodes,
        model.segment_count(),
    );

    let Some(path_file) = &cli.path else {
        return Ok(true);
    };
    let source_path = SourcePath::from_json_file(path_file)?;
    let path = TrainPath::build(&model, &source_path)?;

    println!(
        "path {}: {} waypoints, {} sections",
        path.name().unwrap_or("<unnamed>"),
        path.waypoints().len(),
        path.sections().len(),
    );
    for (index, point) in path.waypoints().iter().enumerate() {
        if cli.verbose || !point.validity().is_clear() {
            println!(
                "  waypoint {index}: {:?} at ({:.1}, {:.1}) [{}]",
                point.kind(),
                point.location().x(),
                point.location().y(),
                point.validity(),
            );
        }
    }

    let mut main_len = 0.0f64;
    let mut passing_len = 0.0f64;
    let mut invalid = 0usize;
    for section in path.sections() {
        match section.kind() {
            SectionKind::Main => main_len += section.length(),
            SectionKind::Passing => passing_len += section.length(),
            SectionKind::Invalid => invalid += 1,
        }
    }
    println!(
        "  main path {main_len:.1} m, passing paths {passing_len:.1} m, {invalid} invalid section(s)"
    );

    Ok(path.is_fully_valid())
}
