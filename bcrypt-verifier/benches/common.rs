use bcrypt_verifier::{CandidateRecord, LoadedRecords};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ALL_CHARS: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()_+-=[]{}|;:.<>?";

/// bcrypt's minimum cost keeps setup time reasonable.
pub const BENCH_COST: u32 = 4;

/// Generates `count` hashed records with a fixed seed. Roughly one in
/// `match_every` records stores a hash of `target`.
pub fn generate_records(count: usize, target: &str, match_every: usize) -> LoadedRecords {
    let mut rng = StdRng::seed_from_u64(42);
    let records = (0..count)
        .map(|i| {
            let password: String = if i % match_every == 0 {
                target.to_owned()
            } else {
                let length = rng.gen_range(8..=32);
                (0..length).map(|_| ALL_CHARS[rng.gen_range(0..ALL_CHARS.len())] as char).collect()
            };
            let hash = bcrypt::hash(&password, BENCH_COST).expect("hashing failed");
            CandidateRecord::new(format!("user{i}@example.com"), hash)
        })
        .collect();

    LoadedRecords { records, skipped: 0 }
}
