// Integration test: CommandManager invariants over real commands
//
// Exercises history bounds, redo clearing, refusal idempotence, round trips
// and the macro/queue asymmetry with the hero receivers.

use command_engine::command::{CommandError, CommandFactory, CommandManager, MoveDirection};
use command_engine::config::EngineConfig;
use command_engine::logging::MemorySink;
use command_engine::receiver::{
    Hero, MemoryStore, Position, Scoreboard, SharedHero, SharedScoreboard, shared,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::thread;

struct Fixture {
    hero: SharedHero,
    scoreboard: SharedScoreboard,
    factory: CommandFactory,
    manager: CommandManager,
    sink: Arc<MemorySink>,
}

fn fixture(history_limit: usize) -> Fixture {
    let hero = shared(Hero::new("Test"));
    let scoreboard = shared(Scoreboard::new());
    let factory = CommandFactory::new(
        hero.clone(),
        scoreboard.clone(),
        Arc::new(MemoryStore::new()),
    );
    let sink = Arc::new(MemorySink::new());
    let config = EngineConfig {
        history_limit,
        ..EngineConfig::default()
    };
    let manager = CommandManager::with_config(config, sink.clone());
    Fixture {
        hero,
        scoreboard,
        factory,
        manager,
        sink,
    }
}

fn snapshot(f: &Fixture) -> (Hero, Scoreboard) {
    (
        f.hero.lock().unwrap().clone(),
        *f.scoreboard.lock().unwrap(),
    )
}

#[test]
fn test_history_never_exceeds_limit_under_random_operations() {
    let f = fixture(7);
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let keys = ["north", "south", "east", "west", "attack", "magic", "heal", "mana"];

    for _ in 0..500 {
        match rng.gen_range(0..10) {
            0..=5 => {
                let key = keys[rng.gen_range(0..keys.len())];
                f.manager.execute(f.factory.create(key).unwrap());
            }
            6 | 7 => {
                f.manager.undo();
            }
            _ => {
                f.manager.redo();
            }
        }
        assert!(f.manager.history_size() <= 7);
    }
}

#[test]
fn test_successful_execute_always_clears_redo() {
    let f = fixture(50);
    for key in ["north", "east", "south"] {
        f.manager.execute(f.factory.create(key).unwrap());
    }
    f.manager.undo();
    f.manager.undo();
    assert_eq!(f.manager.redo_count(), 2);

    assert!(f.manager.execute(f.factory.create("west").unwrap()));
    assert!(!f.manager.has_redo());
    assert_eq!(f.manager.try_redo(), Err(CommandError::NothingToRedo));
}

#[test]
fn test_failed_execute_keeps_redo() {
    let f = fixture(50);
    f.manager.execute(f.factory.create("north").unwrap());
    f.manager.undo();

    // Heal at full health refuses, so the redo stack survives
    assert!(!f.manager.execute(f.factory.create("heal").unwrap()));
    assert!(f.manager.has_redo());
    assert!(f.sink.contains("Health is already full"));
}

#[test]
fn test_double_execute_refused_without_mutation() {
    let f = fixture(50);
    let cmd = f.factory.create_move(MoveDirection::North);

    assert!(f.manager.execute(cmd.clone()));
    let after_first = snapshot(&f);

    assert_eq!(
        f.manager.try_execute(cmd.clone()),
        Err(CommandError::AlreadyExecuted)
    );
    assert_eq!(
        f.manager.try_execute(cmd),
        Err(CommandError::AlreadyExecuted)
    );
    assert_eq!(snapshot(&f), after_first);
    assert_eq!(f.manager.history_size(), 1);
}

#[test]
fn test_every_reversible_command_round_trips() {
    let f = fixture(50);
    // Put the hero somewhere every action is allowed
    {
        let mut hero = f.hero.lock().unwrap();
        hero.apply_damage(40);
        hero.set_mana(60);
    }

    for key in ["north", "south", "east", "west", "attack", "magic", "heal", "mana"] {
        let before = snapshot(&f);
        assert!(f.manager.execute(f.factory.create(key).unwrap()), "{}", key);
        assert_ne!(snapshot(&f), before, "{} did not change state", key);
        assert!(f.manager.undo(), "{}", key);
        assert_eq!(snapshot(&f), before, "{} did not round trip", key);
    }
}

#[test]
fn test_undo_redo_chain_restores_states() {
    let f = fixture(50);
    let start = snapshot(&f);

    for key in ["n", "n", "e", "attack"] {
        f.manager.execute(f.factory.create(key).unwrap());
    }
    let end = snapshot(&f);
    assert_eq!(f.hero.lock().unwrap().position(), Position::new(1, 2));

    while f.manager.undo() {}
    assert_eq!(snapshot(&f), start);
    assert_eq!(f.manager.redo_count(), 4);

    while f.manager.redo() {}
    assert_eq!(snapshot(&f), end);
    assert_eq!(f.manager.history_size(), 4);
}

#[test]
fn test_save_blocks_undo_of_earlier_commands() {
    let f = fixture(50);
    f.manager.execute(f.factory.create("north").unwrap());
    f.manager.execute(f.factory.create("save").unwrap());

    assert!(matches!(
        f.manager.try_undo(),
        Err(CommandError::NotReversible(_))
    ));
    assert_eq!(f.manager.history_size(), 2);
    assert_eq!(f.hero.lock().unwrap().position(), Position::new(0, 1));
    assert_eq!(f.manager.undo_description().as_deref(), Some("Save Game"));
}

#[test]
fn test_macro_versus_queue() {
    // Macro: A succeeds, B refuses, C never runs
    let f = fixture(50);
    f.hero.lock().unwrap().set_mana(0);
    let c = f.factory.create("east").unwrap();
    let count = f.manager.run_macro(vec![
        f.factory.create("north").unwrap(),
        f.factory.create("magic").unwrap(),
        c.clone(),
    ]);
    assert_eq!(count, 1);
    assert!(!c.lock().unwrap().is_executed());
    assert_eq!(f.hero.lock().unwrap().position(), Position::new(0, 1));

    // Queue: same shape, all three attempted, two succeed
    let g = fixture(50);
    g.hero.lock().unwrap().set_mana(0);
    g.manager.enqueue(g.factory.create("north").unwrap());
    g.manager.enqueue(g.factory.create("magic").unwrap());
    g.manager.enqueue(g.factory.create("east").unwrap());
    assert_eq!(g.manager.drain_queue(), 2);
    assert_eq!(g.hero.lock().unwrap().position(), Position::new(1, 1));
    assert_eq!(g.manager.pending_count(), 0);
    assert!(g.sink.contains("Queue drained: 2/3 succeeded"));
}

#[test]
fn test_bounded_eviction_keeps_newest_in_order() {
    let f = fixture(3);
    for key in ["north", "east", "south", "west", "north"] {
        assert!(f.manager.execute(f.factory.create(key).unwrap()));
    }
    assert_eq!(
        f.manager.history_descriptions(),
        vec!["Move South", "Move West", "Move North"]
    );
}

#[test]
fn test_incapacitated_hero_refuses_everything_reversible() {
    let f = fixture(50);
    f.hero.lock().unwrap().apply_damage(1000);
    let before = snapshot(&f);

    for key in ["north", "attack", "magic", "heal", "mana"] {
        let err = f.manager.try_execute(f.factory.create(key).unwrap()).unwrap_err();
        assert!(err.to_string().contains("incapacitated"), "{}: {}", key, err);
    }
    assert_eq!(snapshot(&f), before);
    assert_eq!(f.manager.history_size(), 0);
}

#[test]
fn test_poisoned_receiver_is_contained() {
    let f = fixture(50);
    assert!(f.manager.execute(f.factory.create("east").unwrap()));

    let hero = f.hero.clone();
    let crashed = thread::spawn(move || {
        let _guard = hero.lock().unwrap();
        panic!("receiver owner crashed");
    })
    .join();
    assert!(crashed.is_err());
    assert!(f.hero.is_poisoned());

    assert_eq!(
        f.manager.try_execute(f.factory.create("north").unwrap()),
        Err(CommandError::Poisoned("hero".to_string()))
    );
    assert_eq!(
        f.manager.try_undo(),
        Err(CommandError::Poisoned("hero".to_string()))
    );
    assert_eq!(f.manager.history_size(), 1);
    assert_eq!(f.manager.redo_count(), 0);
    assert_eq!(f.manager.stats().failed, 2);
    assert!(f.sink.contains("Lock poisoned: hero"));

    // Once the receiver is usable again the manager carries on
    f.hero.clear_poison();
    assert!(f.manager.execute(f.factory.create("north").unwrap()));
    assert_eq!(f.manager.history_size(), 2);
    assert_eq!(f.hero.lock().unwrap().position(), Position::new(1, 1));
}
