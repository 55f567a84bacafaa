use rand::distributions::Uniform;
use rand::Rng;

use crate::models::job::{JobId, JOB_ID_LEN};

/// Generate a fresh job id from the thread-local CSPRNG.
///
/// No uniqueness check is made against existing workspaces: with 26^16
/// possible ids a collision is treated as negligible.
pub fn generate_job_id() -> JobId {
    let alphabet = Uniform::new_inclusive(b'a', b'z');
    let letters: String = rand::thread_rng()
        .sample_iter(alphabet)
        .take(JOB_ID_LEN)
        .map(char::from)
        .collect();

    JobId::from_letters(letters)
}
