// Scripted walkthrough of the command engine
// Run with: cargo run --bin demo_command_engine
//
// Reads an optional config from the first argument (.ron or .json),
// otherwise from the platform config dir, otherwise defaults.

use command_engine::command::{CommandFactory, CommandManager};
use command_engine::config::EngineConfig;
use command_engine::logging::{ConsoleSink, init_tracing};
use command_engine::receiver::{Hero, MemoryStore, Scoreboard, shared};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::load_or_default()?,
    };
    tracing::info!(?config, "starting command engine demo");

    println!("Command Engine Demo");
    println!("===================");

    let hero = shared(Hero::new("Ayla"));
    let scoreboard = shared(Scoreboard::new());
    let store = Arc::new(MemoryStore::new());
    let factory = CommandFactory::new(hero.clone(), scoreboard.clone(), store.clone());
    let manager = CommandManager::with_config(config, Arc::new(ConsoleSink));

    println!("\n-- Direct execution");
    for key in ["north", "norte", "east", "attack", "hechizo"] {
        manager.execute(factory.create(key)?);
    }
    if let Err(e) = factory.create("dance") {
        println!("Factory refused: {}", e);
    }

    println!("\n-- Undo / redo");
    manager.undo();
    manager.undo();
    manager.redo();
    println!("History: {:?}", manager.history_descriptions());

    println!("\n-- Save is irreversible");
    manager.execute(factory.create("save")?);
    manager.undo();

    println!("\n-- Queue (best effort) vs macro (fail fast)");
    manager.enqueue(factory.create("south")?);
    manager.enqueue(factory.create("heal")?);
    manager.enqueue(factory.create("west")?);
    manager.drain_queue();

    hero.lock().map_err(|_| "hero lock poisoned")?.set_mana(0);
    manager.run_macro([
        factory.create("up")?,
        factory.create("magic")?,
        factory.create("down")?,
    ]);

    println!("\n-- Async execution");
    let handles: Vec<_> = ["n", "e", "s", "w"]
        .into_iter()
        .map(|key| factory.create(key).map(|cmd| manager.execute_async(cmd)))
        .collect::<Result<_, _>>()?;
    let succeeded = handles.into_iter().map(|h| h.wait()).filter(|ok| *ok).count();
    println!("{} async commands succeeded", succeeded);

    {
        let hero = hero.lock().map_err(|_| "hero lock poisoned")?;
        let board = scoreboard.lock().map_err(|_| "scoreboard lock poisoned")?;
        println!("\nHero: {:?}", *hero);
        println!("Scoreboard: {:?}", *board);
    }
    println!("Saves persisted: {}", store.len());
    println!("Stats: {:?}", manager.stats());

    manager.shutdown();
    Ok(())
}
