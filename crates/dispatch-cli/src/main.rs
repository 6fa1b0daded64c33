use std::env;

use contracts::{BlockPos, Command, CommandPayload, CommandType, EventType, RunConfig};
use dispatch_core::job::JobCatalog;
use dispatch_core::nav::NavMap;
use dispatch_core::world::DispatchWorld;

fn print_usage() {
    println!("dispatch-cli <command>");
    println!("commands:");
    println!("  status");
    println!("  step [n]");
    println!("  run-to <tick>");
    println!("  simulate <run_id> <seed> [ticks]");
    println!("    runs the bundled quarry scenario to the target tick and");
    println!("    prints the event tally plus the final world snapshot");
}

fn parse_u64(value: Option<&String>, label: &str) -> Result<u64, String> {
    let raw = value.ok_or_else(|| format!("missing {}", label))?;
    raw.parse::<u64>()
        .map_err(|_| format!("invalid {}: {}", label, raw))
}

/// A small quarry: a ground floor, a ledge reached by a stair, two minions,
/// an excavation wall, and a build site up on the ledge.
fn quarry_world(config: RunConfig) -> DispatchWorld {
    let nav = NavMap::from_ascii_levels(&[
        "......\n\
         ......\n\
         ...#..\n\
         ......",
        "##....\n\
         ######\n\
         ######\n\
         ######",
    ]);
    let mut world = DispatchWorld::new(config, nav, JobCatalog::default_catalog());

    let mut next_command = 0_u64;
    let mut inject = |world: &mut DispatchWorld, command_type, payload| {
        next_command += 1;
        let command = Command::new(
            format!("cmd_{next_command:03}"),
            world.run_id(),
            world.status().current_tick,
            command_type,
            payload,
        );
        world.inject_command(command);
    };

    inject(
        &mut world,
        CommandType::SpawnMinion,
        CommandPayload::SpawnMinion {
            minion_id: "minion_ada".to_string(),
            position: BlockPos::new(0, 0, 0),
        },
    );
    inject(
        &mut world,
        CommandType::SpawnMinion,
        CommandPayload::SpawnMinion {
            minion_id: "minion_brok".to_string(),
            position: BlockPos::new(5, 3, 0),
        },
    );
    inject(
        &mut world,
        CommandType::MarkJobs,
        CommandPayload::MarkJobs {
            kind_id: "work:excavate".to_string(),
            min: BlockPos::new(3, 2, 0),
            max: BlockPos::new(3, 2, 0),
        },
    );
    inject(
        &mut world,
        CommandType::MarkJobs,
        CommandPayload::MarkJobs {
            kind_id: "work:build".to_string(),
            min: BlockPos::new(2, 0, 1),
            max: BlockPos::new(4, 0, 1),
        },
    );
    world
}

fn event_tally(world: &DispatchWorld) -> Vec<(EventType, usize)> {
    let mut tally: Vec<(EventType, usize)> = Vec::new();
    for event in world.events() {
        match tally.iter_mut().find(|(kind, _)| *kind == event.event_type) {
            Some((_, count)) => *count += 1,
            None => tally.push((event.event_type, 1)),
        }
    }
    tally
}

fn run_simulation(args: &[String]) -> Result<(), String> {
    let run_id = args
        .get(2)
        .cloned()
        .ok_or_else(|| "missing run_id".to_string())?;
    let seed = parse_u64(args.get(3), "seed")?;
    let target_tick = args
        .get(4)
        .map(|value| {
            value
                .parse::<u64>()
                .map_err(|_| format!("invalid ticks: {value}"))
        })
        .transpose()?
        .unwrap_or(48);

    let mut config = RunConfig::default();
    config.run_id = run_id.clone();
    config.seed = seed;
    config.max_ticks = target_tick.max(1);

    let mut world = quarry_world(config);
    world.start();
    let committed = world.run_to_tick(target_tick);

    println!(
        "simulated run_id={} seed={} committed={} {}",
        run_id,
        seed,
        committed,
        world.status()
    );
    for (event_type, count) in event_tally(&world) {
        println!("  {:?}: {}", event_type, count);
    }
    let snapshot = world.snapshot_for_current_tick();
    let rendered = serde_json::to_string_pretty(&snapshot)
        .map_err(|err| format!("failed to render snapshot: {err}"))?;
    println!("{rendered}");
    Ok(())
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);

    match command {
        Some("status") => {
            let world = quarry_world(RunConfig::default());
            println!("{}", world.status());
        }
        Some("step") => {
            let steps = args.get(2).and_then(|v| v.parse::<u64>().ok()).unwrap_or(1);
            let mut world = quarry_world(RunConfig::default());
            world.start();
            let committed = world.step_n(steps);
            println!("stepped={} {}", committed, world.status());
        }
        Some("run-to") => match parse_u64(args.get(2), "tick") {
            Ok(target_tick) => {
                let mut world = quarry_world(RunConfig::default());
                world.start();
                let committed = world.run_to_tick(target_tick);
                println!("committed={} {}", committed, world.status());
            }
            Err(err) => {
                eprintln!("error: {}", err);
                print_usage();
                std::process::exit(2);
            }
        },
        Some("simulate") => {
            if let Err(err) = run_simulation(&args) {
                eprintln!("error: {err}");
                print_usage();
                std::process::exit(2);
            }
        }
        _ => {
            print_usage();
        }
    }
}
