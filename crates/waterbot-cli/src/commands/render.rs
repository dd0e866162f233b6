use waterbot_build::DockerfileGenerator;
use waterbot_pipeline::stages;

use super::Options;

pub fn render_environment(options: &Options) -> anyhow::Result<()> {
    let source = options.source_tree()?;
    print!(
        "{}",
        DockerfileGenerator::new(&stages::build_environment(&source)).render()
    );
    Ok(())
}

pub fn render_build(options: &Options) -> anyhow::Result<()> {
    let source = options.source_tree()?;
    print!("{}", DockerfileGenerator::new(&stages::build(&source)?).render());
    Ok(())
}
