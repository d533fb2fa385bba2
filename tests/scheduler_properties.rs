use std::time::Duration;

use realmkeep::events::{EventScheduler, FiredEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ev {
    Pulse,
    Slash,
    Bolt,
    Shadow,
    Enrage,
}

const MELEE: u8 = 1;
const CASTS: u8 = 2;

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

/// Advance in fixed frames and collect everything that fires, with the time it fired.
fn run(s: &mut EventScheduler<Ev>, frame: Duration, frames: usize) -> Vec<(Duration, FiredEvent<Ev>)> {
    let mut out = Vec::new();
    for _ in 0..frames {
        s.update(frame);
        while let Some(fired) = s.poll() {
            out.push((s.now(), fired));
        }
    }
    out
}

#[test]
fn repeat_intervals_stay_in_range_and_spread_evenly() {
    let mut s = EventScheduler::with_seed(20_25);
    s.schedule_repeating(Ev::Pulse, secs(20), secs(25), 0);

    let mut buckets = [0usize; 5];
    let mut last_due = Duration::ZERO;
    for _ in 0..1000 {
        let wait = s.time_until(Ev::Pulse).expect("pulse pending");
        s.update(wait);
        let fired = s.poll().expect("pulse fired");
        let interval = fired.due - last_due;
        assert!(interval >= secs(20) && interval < secs(25), "interval {:?}", interval);
        buckets[(interval - secs(20)).as_secs() as usize] += 1;
        last_due = fired.due;
        assert!(s.repeat(&fired));
    }
    for count in buckets {
        assert!((140..=260).contains(&count), "buckets {:?}", buckets);
    }
}

#[test]
fn events_fire_in_due_order_and_never_early() {
    let mut s = EventScheduler::with_seed(9);
    s.schedule_range(Ev::Slash, secs(3), secs(9), MELEE);
    s.schedule_range(Ev::Bolt, secs(1), secs(12), CASTS);
    s.schedule(Ev::Shadow, secs(5), CASTS);
    s.schedule(Ev::Enrage, secs(5), 0);

    let fired = run(&mut s, Duration::from_millis(250), 60);
    assert_eq!(fired.len(), 4);
    for (at, event) in &fired {
        assert!(event.due <= *at);
    }
    assert!(fired.windows(2).all(|w| w[0].1.due <= w[1].1.due));
    // equal due times keep insertion order
    let shadow = fired.iter().position(|(_, e)| e.id == Ev::Shadow).unwrap();
    let enrage = fired.iter().position(|(_, e)| e.id == Ev::Enrage).unwrap();
    assert!(shadow < enrage);
}

#[test]
fn group_operations_touch_only_their_group() {
    let mut s = EventScheduler::with_seed(1);
    s.schedule(Ev::Slash, secs(10), MELEE);
    s.schedule(Ev::Pulse, secs(12), MELEE);
    s.schedule(Ev::Bolt, secs(11), CASTS);
    s.schedule(Ev::Enrage, secs(30), 0);

    s.delay_group(MELEE, secs(5));
    assert_eq!(s.time_until(Ev::Slash), Some(secs(15)));
    assert_eq!(s.time_until(Ev::Pulse), Some(secs(17)));
    assert_eq!(s.time_until(Ev::Bolt), Some(secs(11)));
    assert_eq!(s.time_until(Ev::Enrage), Some(secs(30)));

    s.cancel_group(CASTS);
    assert!(!s.is_scheduled(Ev::Bolt));
    assert_eq!(s.len(), 3);

    // group 0 is not a group
    s.cancel_group(0);
    s.delay_group(0, secs(100));
    assert_eq!(s.time_until(Ev::Enrage), Some(secs(30)));

    let order: Vec<_> = run(&mut s, secs(1), 40).into_iter().map(|(_, e)| e.id).collect();
    assert_eq!(order, vec![Ev::Slash, Ev::Pulse, Ev::Enrage]);
}

#[test]
fn reschedule_from_handler_leaves_one_entry() {
    let mut s = EventScheduler::with_seed(4);
    s.schedule(Ev::Shadow, secs(1), 0);
    s.schedule(Ev::Shadow, secs(2), 0);
    s.update(secs(1));
    let fired = s.poll().expect("first shadow");
    assert_eq!(fired.id, Ev::Shadow);
    s.reschedule(Ev::Shadow, secs(30), 0);
    assert_eq!(s.len(), 1);
    assert_eq!(s.time_until(Ev::Shadow), Some(secs(30)));
}

#[test]
fn reset_inside_drain_clears_everything_else() {
    let mut s = EventScheduler::with_seed(4);
    s.schedule(Ev::Enrage, Duration::ZERO, 0);
    s.schedule(Ev::Slash, Duration::ZERO, MELEE);
    s.schedule(Ev::Bolt, secs(3), CASTS);
    let fired = s.poll().expect("zero delay fires on next poll");
    assert_eq!(fired.id, Ev::Enrage);
    s.reset();
    assert!(s.poll().is_none());
    assert!(s.is_empty());
    assert_eq!(s.next_due_in(), None);
}
