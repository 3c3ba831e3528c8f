use crate::error::{MvxError, Result};
use std::path::{Path, PathBuf};

/// Names the interpreter resolves before external dispatch.
pub fn is_builtin(name: &str) -> bool {
    matches!(
        name,
        "cd" | "echo" | "mkdir" | "rm" | "cp" | "copy" | "open"
    )
}

/// Run a built-in. `cwd` is the interpreter's working directory; `cd`
/// mutates it for the rest of the same execute call.
pub fn run(name: &str, args: &[String], cwd: &mut PathBuf) -> Result<()> {
    match name {
        "cd" => cd(args, cwd),
        "echo" => echo(args),
        "mkdir" => mkdir(args, cwd),
        "rm" => rm(args, cwd),
        "cp" | "copy" => cp(args, cwd),
        "open" => open(args, cwd),
        other => Err(MvxError::Parse(format!("not a builtin: {}", other))),
    }
}

fn resolve(cwd: &Path, arg: &str) -> PathBuf {
    let path = Path::new(arg);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

fn cd(args: &[String], cwd: &mut PathBuf) -> Result<()> {
    let target = args
        .first()
        .ok_or_else(|| MvxError::Parse("cd: missing directory".to_string()))?;

    let resolved = resolve(cwd, target).canonicalize()?;
    if !resolved.is_dir() {
        return Err(MvxError::Parse(format!(
            "cd: not a directory: {}",
            resolved.display()
        )));
    }
    *cwd = resolved;
    Ok(())
}

fn echo(args: &[String]) -> Result<()> {
    println!("{}", args.join(" "));
    Ok(())
}

/// Always recursive; a `-p` flag is tolerated and ignored.
fn mkdir(args: &[String], cwd: &Path) -> Result<()> {
    for arg in args.iter().filter(|a| a.as_str() != "-p") {
        std::fs::create_dir_all(resolve(cwd, arg))?;
    }
    Ok(())
}

/// Always recursive and forgiving: missing paths are not an error. This is
/// the portable simplification, not an oversight.
fn rm(args: &[String], cwd: &Path) -> Result<()> {
    for arg in args {
        let path = resolve(cwd, arg);
        let outcome = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        match outcome {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

/// Single-file copy. Copying into an existing directory keeps the source
/// file name.
fn cp(args: &[String], cwd: &Path) -> Result<()> {
    let (src, dst) = match args {
        [src, dst] => (resolve(cwd, src), resolve(cwd, dst)),
        _ => {
            return Err(MvxError::Parse(
                "cp: expected <source> <destination>".to_string(),
            ))
        }
    };

    let dst = if dst.is_dir() {
        match src.file_name() {
            Some(name) => dst.join(name),
            None => dst,
        }
    } else {
        dst
    };

    std::fs::copy(&src, &dst)?;
    Ok(())
}

fn open(args: &[String], cwd: &Path) -> Result<()> {
    let target = args
        .first()
        .ok_or_else(|| MvxError::Parse("open: missing path".to_string()))?;
    let path = resolve(cwd, target);

    let launcher = if cfg!(windows) {
        "explorer"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };

    std::process::Command::new(launcher).arg(path).spawn()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn builtin_names() {
        for name in ["cd", "echo", "mkdir", "rm", "cp", "copy", "open"] {
            assert!(is_builtin(name));
        }
        assert!(!is_builtin("mvn"));
    }

    #[test]
    fn cd_mutates_cwd_and_validates_target() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let mut cwd = dir.path().to_path_buf();
        run("cd", &strings(&["sub"]), &mut cwd).unwrap();
        assert_eq!(cwd, dir.path().join("sub").canonicalize().unwrap());

        assert!(run("cd", &strings(&["nope"]), &mut cwd).is_err());
        assert!(run("cd", &[], &mut cwd).is_err());
    }

    #[test]
    fn mkdir_is_recursive_and_ignores_dash_p() {
        let dir = TempDir::new().unwrap();
        let mut cwd = dir.path().to_path_buf();

        run("mkdir", &strings(&["-p", "a/b/c", "d"]), &mut cwd).unwrap();
        assert!(dir.path().join("a/b/c").is_dir());
        assert!(dir.path().join("d").is_dir());
        assert!(!dir.path().join("-p").exists());
    }

    #[test]
    fn rm_is_recursive_and_tolerates_missing() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("tree/deep")).unwrap();
        std::fs::write(dir.path().join("tree/deep/file"), "x").unwrap();
        std::fs::write(dir.path().join("plain"), "y").unwrap();

        let mut cwd = dir.path().to_path_buf();
        run("rm", &strings(&["tree", "plain", "ghost"]), &mut cwd).unwrap();
        assert!(!dir.path().join("tree").exists());
        assert!(!dir.path().join("plain").exists());
    }

    #[test]
    fn cp_copies_files_and_into_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("src.txt"), "payload").unwrap();
        std::fs::create_dir(dir.path().join("dest")).unwrap();

        let mut cwd = dir.path().to_path_buf();
        run("cp", &strings(&["src.txt", "copy.txt"]), &mut cwd).unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("copy.txt")).unwrap(),
            "payload"
        );

        run("copy", &strings(&["src.txt", "dest"]), &mut cwd).unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("dest/src.txt")).unwrap(),
            "payload"
        );

        assert!(run("cp", &strings(&["just-one"]), &mut cwd).is_err());
    }
}
