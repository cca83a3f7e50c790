/*
 * Build script that generates BuildInformation/GitInformation for the sample.
 *
 * Everything is driven by cargo's environment. Set BUILDFACTS_INCLUDE_GIT_INFO
 * (and optionally BUILDFACTS_USE_GIT_PROCESS) in `.cargo/config.toml` or CI to
 * get the git group as well.
 */

fn main() -> anyhow::Result<()> {
    let sources = buildfacts::generate_for_build_script()?;

    if sources.git.as_ref().is_some_and(buildfacts::GitFacts::is_empty) {
        println!("cargo:warning=git info is enabled but no repository state was found");
    }

    Ok(())
}
