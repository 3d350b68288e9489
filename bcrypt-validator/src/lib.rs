use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Startup banner, also shown at the top of `--help`.
pub const BANNER: &str = r#" _                           _ __     __    _ _     _       _
| |__   ___ _ __ _   _ _ __ | |\ \   / /_ _| (_) __| | __ _| |_ ___  _ __
| '_ \ / __| '__| | | | '_ \| __\ \ / / _` | | |/ _` |/ _` | __/ _ \| '__|
| |_) | (__| |  | |_| | |_) | |_ \ V / (_| | | | (_| | (_| | || (_) | |
|_.__/ \___|_|   \__, | .__/ \__| \_/ \__,_|_|_|\__,_|\__,_|\__\___/|_|
                 |___/|_|
"#;

/// Suffix appended to the derived result file name.
pub const RESULT_SUFFIX: &str = "_result.txt";

/// Derives the result file name from the input path.
///
/// Every `.` in the path becomes `_`, then only the final component is kept,
/// so the result lands in the working directory:
/// `data/users.csv` becomes `users_csv_result.txt`.
pub fn default_output_path(input: &Path) -> PathBuf {
    let replaced = input.to_string_lossy().replace('.', "_");
    let base = Path::new(&replaced)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| replaced.clone());
    PathBuf::from(format!("{base}{RESULT_SUFFIX}"))
}

/// Runs `future` on a new multi-threaded runtime, then shuts the runtime down
/// waiting at most `grace` for blocking tasks still in flight.
///
/// Dropping a runtime waits for every blocking task without a limit, and a
/// bcrypt comparison abandoned at shutdown can run for minutes.
pub fn block_on_with_grace<F: Future>(future: F, grace: Duration) -> io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(grace);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn test_block_on_with_grace_leaves_blocking_tasks_behind() {
        let started = Instant::now();
        let value = block_on_with_grace(
            async {
                tokio::task::spawn_blocking(|| std::thread::sleep(Duration::from_secs(30)));
                7
            },
            Duration::from_millis(100),
        )
        .unwrap();

        assert_eq!(value, 7);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(default_output_path(Path::new("users.csv")), PathBuf::from("users_csv_result.txt"));
        assert_eq!(
            default_output_path(Path::new("data/leak.2024.txt")),
            PathBuf::from("leak_2024_txt_result.txt")
        );
        assert_eq!(default_output_path(Path::new("hashes")), PathBuf::from("hashes_result.txt"));
    }

    #[test]
    fn test_default_output_path_dotted_directories() {
        assert_eq!(
            default_output_path(Path::new("./dumps.d/list.csv")),
            PathBuf::from("list_csv_result.txt")
        );
        assert_eq!(default_output_path(Path::new("../x")), PathBuf::from("x_result.txt"));
    }
}
