//! Native linker driver
//!
//! Hands generated C source to the system C compiler and produces an
//! executable. The compiler is either configured explicitly or the first of
//! `cc`, `clang`, `gcc` that runs.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info};

use crate::utils::{Error, Result};

/// Compilers tried in order when none is configured
pub const DEFAULT_COMPILERS: [&str; 3] = ["cc", "clang", "gcc"];

/// Builds executables from C source
#[derive(Debug, Clone, Default)]
pub struct Linker {
    compiler: Option<String>,
    work_dir: Option<PathBuf>,
}

impl Linker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific compiler instead of searching
    pub fn with_compiler(mut self, compiler: impl Into<String>) -> Self {
        self.compiler = Some(compiler.into());
        self
    }

    /// Directory for the temporary C file, defaults to the system temp dir
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    fn candidates(&self) -> Vec<String> {
        match &self.compiler {
            Some(cc) => vec![cc.clone()],
            None => DEFAULT_COMPILERS.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Compile `c_source` into an executable at `output`
    pub fn link<P: AsRef<Path>>(&self, c_source: &str, output: P) -> Result<()> {
        let output = output.as_ref();
        let prefix = output
            .file_stem()
            .map(|s| format!("{}_", s.to_string_lossy()))
            .unwrap_or_else(|| "bahasa_".to_string());
        let dir = self.work_dir.clone().unwrap_or_else(std::env::temp_dir);

        let mut c_file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".c")
            .tempfile_in(&dir)?;
        c_file.write_all(c_source.as_bytes())?;
        c_file.flush()?;

        // Dropping `c_file` removes it whether or not the compiler succeeded
        self.invoke(c_file.path(), output)
    }

    fn invoke(&self, c_file: &Path, output: &Path) -> Result<()> {
        let mut last_error = String::new();

        for compiler in self.candidates() {
            debug!("trying {} on {}", compiler, c_file.display());
            let result = Command::new(&compiler)
                .arg("-w")
                .arg("-o")
                .arg(output)
                .arg(c_file)
                .output();

            match result {
                Ok(out) if out.status.success() => {
                    info!("linked {} with {}", output.display(), compiler);
                    return Ok(());
                }
                Ok(out) => {
                    // The compiler ran and rejected the input; another one won't help
                    return Err(Error::Link(format!(
                        "{} failed: {}",
                        compiler,
                        String::from_utf8_lossy(&out.stderr).trim()
                    )));
                }
                Err(e) => {
                    last_error = format!("{}: {}", compiler, e);
                }
            }
        }

        Err(Error::Link(format!("no usable C compiler found ({})", last_error)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CCodeGen;
    use crate::middle::eval::run_module;

    #[test]
    fn test_candidates() {
        assert_eq!(Linker::new().candidates(), vec!["cc", "clang", "gcc"]);
        assert_eq!(Linker::new().with_compiler("tcc").candidates(), vec!["tcc"]);
    }

    #[test]
    fn test_missing_compiler_is_link_error() {
        let dir = tempfile::tempdir().unwrap();
        let linker = Linker::new()
            .with_compiler("bahasa-no-such-cc")
            .with_work_dir(dir.path());
        let err = linker
            .link("int main(void) { return 0; }", dir.path().join("missing_cc"))
            .unwrap_err();
        assert!(matches!(err, Error::Link(ref msg) if msg.contains("no usable C compiler")));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    fn cc_available() -> bool {
        Command::new("cc")
            .arg("--version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    /// Build natively, run, and compare with the evaluator on the same module
    fn assert_native_matches_evaluator(name: &str, source: &str) {
        let module = crate::compile_source(source, name).unwrap();
        let (code, host) = run_module(&module, "main").unwrap();

        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join(name);
        let c_source = CCodeGen::new().generate_source(&module).unwrap();
        Linker::new().with_compiler("cc").link(&c_source, &exe).unwrap();

        let out = Command::new(&exe).output().unwrap();
        assert_eq!(String::from_utf8_lossy(&out.stdout), host.output);
        assert_eq!(out.status.code(), Some(code));
    }

    #[test]
    fn test_native_build_matches_evaluator() {
        if !cc_available() {
            eprintln!("skipping native build test: no `cc` on PATH");
            return;
        }

        assert_native_matches_evaluator(
            "demo",
            r#"modul demo
            fungsi tambah(a: int, b: int) -> int { <- a + b }
            fungsi main() -> int {
                mutasi hasil: int = tambah(2, 3)
                tampilkan("%d", hasil)
                <- 0
            }"#,
        );

        assert_native_matches_evaluator(
            "pulih",
            r#"fungsi main() -> int {
                mutasi xs: koleksi[int] = [1, 2, 3]
                abaikan {
                    tampilkan("sebelum %d\n", xs.1)
                    xs.7
                    tampilkan("tidak tercapai %d\n", 0)
                }
                tidur(0)
                tampilkan("sesudah %d\n", xs.2)
                <- 5
            }"#,
        );

        assert_native_matches_evaluator(
            "nama",
            r#"fungsi double(a: int) -> int { <- a * 2 }
            fungsi char(a: int) -> int { <- a + 1 }
            fungsi _t0(a: int) -> int { <- a }
            fungsi main() -> int {
                tampilkan("%d\n", double(char(_t0(4))))
                tampilkan("%d\n", (0 - 2147483647 - 1) / (0 - 1))
                tampilkan("%d\n", (0 - 7) modulo 2)
                tampilkan("%d\n", bukan 0)
                tampilkan("%s\n", "selesai")
                <- 3
            }"#,
        );
    }
}
