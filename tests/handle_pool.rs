use dynacoe::utils::prelude::*;

#[test]
fn handle_set() {
    let mut set: HandlePool<Handle> = HandlePool::new();
    assert_eq!(set.len(), 0);

    let e1 = set.create();
    assert!(e1.is_valid());
    assert!(set.is_alive(e1));
    assert_eq!(set.len(), 1);

    let mut e2 = e1;
    e2.invalidate();
    assert!(!e2.is_valid());
    assert!(!set.is_alive(e2));
    assert!(set.is_alive(e1));

    assert!(set.free(e1));
    assert!(!set.free(e1));
    assert!(!set.is_alive(e1));
    assert_eq!(set.len(), 0);
}

#[test]
fn index_reuse() {
    let mut set: HandlePool<Handle> = HandlePool::new();

    let mut v = vec![];
    for _ in 0..10 {
        v.push(set.create());
    }

    assert_eq!(set.len(), 10);
    for e in v.iter() {
        set.free(*e);
    }

    for _ in 0..10 {
        let e = set.create();
        assert!((e.index() as usize) < v.len());
        assert!(v[e.index() as usize].version() != e.version());
        assert!(!set.is_alive(v[e.index() as usize]));
    }
}

#[test]
fn index_compact_reuse() {
    let mut set: HandlePool<Handle> = HandlePool::new();

    let mut v = vec![];
    for _ in 0..5 {
        for _ in 0..50 {
            v.push(set.create());
        }

        let size = v.len() / 2;
        for _ in 0..size {
            let len = v.len();
            set.free(v.swap_remove(rand::random::<usize>() % len));
        }
    }

    for i in v {
        set.free(i);
    }

    let capacity = set.capacity();
    for _ in 0..capacity {
        let handle = set.create();
        assert!((handle.index() as usize) < capacity);
    }

    assert_eq!(set.capacity(), capacity);
}

#[test]
fn foreign_pool() {
    let mut p1: HandlePool<Handle> = HandlePool::new();
    let mut p2: HandlePool<Handle> = HandlePool::new();
    assert_ne!(p1.table(), p2.table());

    let h1 = p1.create();
    let h2 = p2.create();
    assert_eq!((h1.index(), h1.version()), (h2.index(), h2.version()));
    assert_ne!(h1, h2);

    assert!(!p1.is_alive(h2));
    assert!(!p2.free(h1));
    assert!(p2.is_alive(h2));
}

#[test]
fn iter() {
    let mut set: HandlePool<Handle> = HandlePool::new();
    let v: Vec<_> = (0..10).map(|_| set.create()).collect();

    for h in v.iter().step_by(3) {
        set.free(*h);
    }

    let alive: Vec<_> = set.iter().collect();
    let expected: Vec<_> = v
        .iter()
        .enumerate()
        .filter(|&(i, _)| i % 3 != 0)
        .map(|(_, h)| *h)
        .collect();

    assert_eq!(alive, expected);
}
