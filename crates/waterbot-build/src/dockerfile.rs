use serde_json::Value;
use waterbot_core::{CacheMount, Container, Op};

/// Directory inside the build context holding the `index`-th mounted source.
pub fn context_dir_name(index: usize) -> String {
    format!("dir{index}")
}

/// Renders a [`Container`] as a BuildKit Dockerfile.
///
/// Operations map one-to-one onto instructions in declaration order.
/// Mounted caches produce no instruction of their own; they are attached as
/// `--mount=type=cache` to every `RUN` that follows them.
pub struct DockerfileGenerator<'a> {
    container: &'a Container,
}

impl<'a> DockerfileGenerator<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    pub fn render(&self) -> String {
        let mut out = String::from("# syntax=docker/dockerfile:1\n");
        out.push_str(&format!(
            "FROM {}\n",
            self.container.base().unwrap_or("scratch")
        ));

        let mut caches: Vec<&CacheMount> = Vec::new();
        let mut directories = 0;

        for op in self.container.ops() {
            match op {
                Op::Directory { path, .. } => {
                    out.push_str(&format!(
                        "COPY {src}/ {dst}\n",
                        src = context_dir_name(directories),
                        dst = directory_target(path),
                    ));
                    directories += 1;
                }
                Op::Workdir(path) => out.push_str(&format!("WORKDIR {path}\n")),
                Op::MountedCache(mount) => caches.push(mount),
                Op::Exec(args) => {
                    out.push_str("RUN ");
                    for mount in &caches {
                        out.push_str(&format!(
                            "--mount=type=cache,id={id},target={target} ",
                            id = mount.cache.name(),
                            target = mount.path,
                        ));
                    }
                    out.push_str(&exec_form(args));
                    out.push('\n');
                }
                Op::EnvVariable { name, value } => {
                    out.push_str(&format!("ENV {name}={}\n", env_value(value)));
                }
                Op::ExposedPort(port) => out.push_str(&format!("EXPOSE {port}\n")),
                Op::Entrypoint(args) => {
                    out.push_str(&format!("ENTRYPOINT {}\n", exec_form(args)));
                }
            }
        }

        out
    }
}

/// JSON array form, so arguments are never re-split by a shell.
fn exec_form(args: &[String]) -> String {
    Value::from(args.to_vec()).to_string()
}

/// Double-quoted ENV value with `$` escaped so Docker stores it literally.
fn env_value(value: &str) -> String {
    Value::from(value).to_string().replace('$', "\\$")
}

fn directory_target(path: &str) -> String {
    if path.ends_with('/') {
        path.to_owned()
    } else {
        format!("{path}/")
    }
}
