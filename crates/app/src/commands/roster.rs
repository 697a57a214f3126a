//! The `quiz learners` and `quiz subjects` commands.

use std::io::Write;

use anyhow::Result;

use crate::config::Config;

pub fn learners(config: &Config) -> Result<()> {
    write_learners(&mut std::io::stdout().lock(), config)
}

pub fn subjects(config: &Config) -> Result<()> {
    write_subjects(&mut std::io::stdout().lock(), config)
}

fn write_learners<W: Write>(out: &mut W, config: &Config) -> Result<()> {
    for learner in &config.learners {
        writeln!(out, "{:<12} {}", learner.id, learner.name)?;
    }
    Ok(())
}

fn write_subjects<W: Write>(out: &mut W, config: &Config) -> Result<()> {
    for subject in &config.subjects {
        writeln!(out, "{:<12} {}", subject.key, subject.label)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_roster_is_listed() {
        let config = Config::default();

        let mut out = Vec::new();
        write_learners(&mut out, &config).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.starts_with("chiao"));

        let mut out = Vec::new();
        write_subjects(&mut out, &config).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("earth        Earth Science"));
    }
}
