#![no_main]

use libfuzzer_sys::fuzz_target;
use pastry_routing::{Overlay, OverlayConfig};

const HASH_LEN: usize = 4;

fuzz_target!(|data: &[u8]| {
    // Drive arbitrary insert/delete/lookup/route sequences through the overlay.
    // None of them may panic, and both structures must stay consistent.
    let config = OverlayConfig {
        hash_len: HASH_LEN,
        leaf_capacity: 4,
        ..Default::default()
    };
    let mut overlay = match Overlay::new(&[0x80u8, 0, 0, 0], config) {
        Ok(overlay) => overlay,
        Err(_) => return,
    };

    // Each op: 1 opcode byte + up to HASH_LEN key bytes
    for chunk in data.chunks(1 + HASH_LEN) {
        let (op, key) = match chunk.split_first() {
            Some(split) => split,
            None => continue,
        };

        match op % 5 {
            0 => {
                let _ = overlay.set(key, u32::from(*op));
            }
            1 => {
                let _ = overlay.delete(key);
            }
            2 => {
                let _ = overlay.lookup(key);
            }
            3 => {
                let _ = overlay.nearest(key);
            }
            _ => {
                if let Ok(route) = overlay.route(key, usize::from(*op)) {
                    assert!(route.len() <= overlay.len());
                }
            }
        }

        assert!(overlay.leaf_set().len() <= 4);
        for leaf in overlay.leaf_set().keys() {
            assert!(overlay.contains(leaf.as_bytes()));
        }
    }
});
