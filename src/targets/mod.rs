//! The state licensing-board sites this crate can scrape.

pub mod delaware;
pub mod indiana;
pub mod iowa;
pub mod kentucky;
pub mod maryland;
pub mod mississippi;
pub mod mylicense;
pub mod nebraska;
pub mod new_hampshire;
pub mod rhode_island;
pub mod texas;
pub mod utah;
pub mod west_virginia;

use clap::ValueEnum;

use crate::config::Config;
use crate::scrape::Target;

use self::iowa::Iowa;
use self::kentucky::Kentucky;
use self::maryland::Maryland;
use self::mississippi::Mississippi;
use self::mylicense::MyLicense;
use self::nebraska::Nebraska;
use self::rhode_island::RhodeIsland;
use self::texas::Texas;
use self::utah::Utah;
use self::west_virginia::WestVirginia;

/// Target selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TargetName {
    Delaware,
    Indiana,
    NewHampshire,
    Iowa,
    Kentucky,
    Maryland,
    Mississippi,
    Nebraska,
    RhodeIsland,
    Texas,
    Utah,
    WestVirginia,
}

impl TargetName {
    pub fn all() -> &'static [TargetName] {
        Self::value_variants()
    }

    /// The target without any partition input loaded, enough to describe it.
    pub fn bare(self) -> Box<dyn Target> {
        match self {
            TargetName::Delaware => Box::new(MyLicense::new(&delaware::SITE)),
            TargetName::Indiana => Box::new(MyLicense::new(&indiana::SITE)),
            TargetName::NewHampshire => Box::new(MyLicense::new(&new_hampshire::SITE)),
            TargetName::Iowa => Box::new(Iowa::new()),
            TargetName::Kentucky => Box::new(Kentucky),
            TargetName::Maryland => Box::new(Maryland::new(Vec::new())),
            TargetName::Mississippi => Box::new(Mississippi),
            TargetName::Nebraska => Box::new(Nebraska),
            TargetName::RhodeIsland => Box::new(RhodeIsland::new()),
            TargetName::Texas => Box::new(Texas::new()),
            TargetName::Utah => Box::new(Utah),
            TargetName::WestVirginia => Box::new(WestVirginia::new()),
        }
    }

    pub fn name(self) -> &'static str {
        self.bare().name()
    }

    pub fn portal_url(self) -> &'static str {
        self.bare().portal_url()
    }

    /// Build the target ready to run, loading whatever input files it needs.
    pub fn build(self, config: &Config) -> anyhow::Result<Box<dyn Target>> {
        match self {
            TargetName::Maryland => {
                Ok(Box::new(Maryland::from_zip_file(&config.maryland_zip_file)?))
            }
            other => Ok(other.bare()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::COLUMNS;

    #[test]
    fn cli_names_match_target_names() {
        for name in TargetName::all() {
            let cli_name = name.to_possible_value().unwrap().get_name().to_string();
            assert_eq!(name.bare().name(), cli_name);
        }
    }

    #[test]
    fn extra_columns_do_not_shadow_common_ones() {
        for name in TargetName::all() {
            let target = name.bare();
            for column in target.extra_columns() {
                assert!(!COLUMNS.contains(column), "{} redeclares {column}", target.name());
            }
        }
    }

    #[test]
    fn maryland_needs_its_zip_list() {
        let config = Config {
            maryland_zip_file: "/nonexistent/md_zip.csv".into(),
            ..Config::default()
        };
        assert!(TargetName::Maryland.build(&config).is_err());
        assert_eq!(TargetName::Utah.build(&config).unwrap().name(), "utah");
    }
}
