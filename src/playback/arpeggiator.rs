//! Arpeggio note orders

use rand::Rng;

use super::types::ArpDirection;

/// Index order for one pass of a direction over `len` notes
fn pass(direction: ArpDirection, len: usize) -> Vec<usize> {
    match direction {
        ArpDirection::Up | ArpDirection::Random => (0..len).collect(),
        ArpDirection::Down => (0..len).rev().collect(),
        ArpDirection::UpDown => {
            let mut order: Vec<usize> = (0..len).collect();
            if len > 2 {
                order.extend((1..len - 1).rev());
            }
            order
        }
    }
}

/// `steps` notes drawn from an ascending chord in the given direction,
/// cycling as needed.
pub fn arp_sequence<R: Rng + ?Sized>(
    notes: &[u8],
    direction: ArpDirection,
    steps: usize,
    rng: &mut R,
) -> Vec<u8> {
    if notes.is_empty() {
        return Vec::new();
    }
    if direction == ArpDirection::Random {
        return (0..steps)
            .map(|_| notes[rng.random_range(0..notes.len())])
            .collect();
    }

    let order = pass(direction, notes.len());
    order.iter().cycle().take(steps).map(|i| notes[*i]).collect()
}
