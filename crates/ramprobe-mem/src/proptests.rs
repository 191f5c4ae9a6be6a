use std::collections::HashMap;

use proptest::prelude::*;

use crate::{AliasedRam, DenseRam, WordStore, WordWidth};

#[derive(Debug, Clone)]
enum Op {
    Write { word: u64, value: u64 },
    Read { word: u64 },
}

const MAX_WORDS: u64 = 64;
const MAX_OPS: usize = 64;

fn width_strategy() -> impl Strategy<Value = WordWidth> {
    prop_oneof![
        Just(WordWidth::W16),
        Just(WordWidth::W32),
        Just(WordWidth::W64),
    ]
}

fn op_strategy(words: u64) -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..words, any::<u64>()).prop_map(|(word, value)| Op::Write { word, value }),
        2 => (0..words).prop_map(|word| Op::Read { word }),
    ]
}

fn ops_strategy(words: u64) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op_strategy(words), 1..MAX_OPS)
}

proptest! {
    // A dense bank behaves like a map from word index to the last value
    // written, masked to the word width.
    #[test]
    fn dense_matches_last_write_model(
        (width, words, ops) in (width_strategy(), 1..MAX_WORDS).prop_flat_map(|(width, words)| {
            (Just(width), Just(words), ops_strategy(words))
        })
    ) {
        let bytes = width.bytes();
        let mut ram = DenseRam::new(words * bytes, width).unwrap();
        let mut model: HashMap<u64, u64> = HashMap::new();

        for op in ops {
            match op {
                Op::Write { word, value } => {
                    ram.write_word(word * bytes, value).unwrap();
                    model.insert(word, value & width.mask());
                }
                Op::Read { word } => {
                    let got = ram.read_word(word * bytes).unwrap();
                    let want = model.get(&word).copied().unwrap_or(0);
                    prop_assert_eq!(got, want);
                }
            }
        }
    }

    // An aliased bank is exactly a dense bank addressed modulo its physical
    // size, for any nominal/physical combination.
    #[test]
    fn aliased_matches_folded_model(
        (width, phys_words, nominal_words, ops) in
            (width_strategy(), 1..16u64, 0..48u64).prop_flat_map(|(width, phys, extra)| {
                let nominal = phys + extra;
                (Just(width), Just(phys), Just(nominal), ops_strategy(nominal))
            })
    ) {
        let bytes = width.bytes();
        let mut ram = AliasedRam::new(nominal_words * bytes, phys_words * bytes, width).unwrap();
        let mut model: HashMap<u64, u64> = HashMap::new();

        for op in ops {
            match op {
                Op::Write { word, value } => {
                    ram.write_word(word * bytes, value).unwrap();
                    model.insert(word % phys_words, value & width.mask());
                }
                Op::Read { word } => {
                    let got = ram.read_word(word * bytes).unwrap();
                    let want = model.get(&(word % phys_words)).copied().unwrap_or(0);
                    prop_assert_eq!(got, want);
                }
            }
        }
    }
}
