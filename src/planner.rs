//! Turn a configuration into an ordered plan of steps
//!
//! Config entries expand in file order. An `apt` entry becomes one step per
//! package and an `env` entry one step per rc file, so each shows up (and
//! can fail) on its own in the log.

use planned::Plan;

use crate::config::{Config, StepConfig, parse_mode};
use crate::paths::{display, expand, expand_path};
use crate::steps::{
    AptPackage, AptUpdate, ConfigFile, Directory, Download, EnvExport, Exec, GitClone, GoInstall,
    Ownership, ServiceRestart,
};
use crate::user::TargetUser;

/// Build the plan for a validated configuration
pub fn build_plan(config: &Config, user: &TargetUser) -> Plan {
    let mut plan = Plan::new();
    let mut apt_updates = 0;
    for entry in &config.steps {
        if matches!(entry, StepConfig::AptUpdate(_)) {
            apt_updates += 1;
        }
        add_entry(&mut plan, entry, user, apt_updates);
    }
    plan
}

fn add_entry(plan: &mut Plan, entry: &StepConfig, user: &TargetUser, apt_pass: usize) {
    match entry {
        StepConfig::AptUpdate(c) => {
            plan.push(Box::new(
                AptUpdate::new(expand_path(&c.stamp, user), c.max_age_hours).with_pass(apt_pass),
            ));
        }
        StepConfig::Apt(c) => {
            for package in &c.packages {
                plan.push(Box::new(AptPackage::new(package)));
            }
        }
        StepConfig::Directory(c) => {
            let path = expand_path(&c.path, user);
            plan.push(Box::new(Directory {
                label: display(&path, user),
                owner: Ownership::for_path(&path, user),
                mode: c.mode.as_deref().and_then(parse_mode),
                path,
            }));
        }
        StepConfig::File(c) => {
            let path = expand_path(&c.path, user);
            plan.push(Box::new(ConfigFile {
                label: display(&path, user),
                owner: Ownership::for_path(&path, user),
                contents: c.contents.clone(),
                mode: c.mode.as_deref().and_then(parse_mode),
                preserve: c.preserve,
                path,
            }));
        }
        StepConfig::Env(c) => {
            for rc in &c.rc_files {
                let rc_file = expand_path(rc, user);
                plan.push(Box::new(EnvExport {
                    name: c.name.clone(),
                    value: c.value.clone(),
                    rc_label: display(&rc_file, user),
                    owner: Ownership::for_path(&rc_file, user),
                    rc_file,
                }));
            }
        }
        StepConfig::Download(c) => {
            let dest = expand_path(&c.dest, user);
            plan.push(Box::new(Download {
                url: expand(&c.url, user),
                label: display(&dest, user),
                owner: Ownership::for_path(&dest, user),
                mode: c.mode.as_deref().and_then(parse_mode),
                dest,
            }));
        }
        StepConfig::Git(c) => {
            let dest = expand_path(&c.dest, user);
            plan.push(Box::new(GitClone {
                url: expand(&c.url, user),
                label: display(&dest, user),
                owner: Ownership::for_path(&dest, user),
                branch: c.branch.clone(),
                depth: c.depth,
                dest,
            }));
        }
        StepConfig::Go(c) => {
            plan.push(Box::new(GoInstall::new(
                &c.package,
                c.binary.as_deref(),
                user,
            )));
        }
        StepConfig::Exec(c) => {
            plan.push(Box::new(Exec {
                name: c.name.clone(),
                argv: c.argv.iter().map(|a| expand(a, user)).collect(),
                creates: expand_path(&c.creates, user),
                user: c.as_user.then(|| user.clone()),
            }));
        }
        StepConfig::Service(c) => {
            plan.push(Box::new(ServiceRestart {
                unit: c.unit.clone(),
                watch: c.watch.iter().map(|p| expand_path(p, user)).collect(),
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CONFIG;
    use planned::Privilege;
    use std::path::PathBuf;

    fn kali() -> TargetUser {
        TargetUser {
            name: "kali".into(),
            uid: 1000,
            gid: 1000,
            home: PathBuf::from("/home/kali"),
        }
    }

    fn plan_for(toml: &str) -> Plan {
        let config = Config::parse(toml).unwrap();
        config.validate().unwrap();
        build_plan(&config, &kali())
    }

    #[test]
    fn test_apt_expands_per_package() {
        let plan = plan_for("[[step]]\nkind = \"apt\"\npackages = [\"tmux\", \"jq\"]\n");
        assert_eq!(plan.names(), vec!["apt:tmux", "apt:jq"]);
    }

    #[test]
    fn test_env_expands_per_rc_file() {
        let plan = plan_for(
            r#"
[[step]]
kind = "env"
name = "GOPATH"
value = "$HOME/go"
rc_files = ["~/.zshrc", "~/.bashrc"]
"#,
        );
        assert_eq!(plan.names(), vec!["env:GOPATH@~/.zshrc", "env:GOPATH@~/.bashrc"]);
        assert!(!plan.has_privileged());
    }

    #[test]
    fn test_order_follows_config() {
        let plan = plan_for(
            r#"
[[step]]
kind = "directory"
path = "~/go/bin"

[[step]]
kind = "apt_update"

[[step]]
kind = "file"
path = "/etc/motd"
contents = "hi\n"

[[step]]
kind = "go"
package = "github.com/ropnop/kerbrute@latest"
"#,
        );
        assert_eq!(
            plan.names(),
            vec!["directory:~/go/bin", "apt_update", "file:/etc/motd", "go:kerbrute"]
        );
    }

    #[test]
    fn test_privilege_follows_path() {
        let plan = plan_for(
            r#"
[[step]]
kind = "file"
path = "~/.tmux.conf"
contents = "set -g mouse on\n"

[[step]]
kind = "file"
path = "/etc/ssh/sshd_config.d/10-postinst.conf"
contents = "PermitRootLogin no\n"
"#,
        );
        let privileges: Vec<Privilege> = plan.iter().map(|s| s.privilege()).collect();
        assert_eq!(privileges, vec![Privilege::User, Privilege::System]);
        assert!(plan.has_privileged());
    }

    #[test]
    fn test_exec_argv_expanded_for_user() {
        let plan = plan_for(
            r#"
[[step]]
kind = "exec"
name = "venv"
argv = ["python3", "-m", "venv", "~/venv"]
creates = "~/venv/bin/python"
as_user = true
"#,
        );
        let step = plan.iter().next().unwrap();
        assert_eq!(step.preview(), "python3 -m venv /home/kali/venv");
        assert_eq!(step.privilege(), Privilege::User);
    }

    #[test]
    fn test_default_config_builds() {
        let config = Config::parse(DEFAULT_CONFIG).unwrap();
        let plan = build_plan(&config, &kali());
        let names = plan.names();

        assert!(names.len() > config.steps.len());
        assert!(names.contains(&"apt:tmux".to_string()));
        assert!(names.contains(&"file:~/.tmux.conf".to_string()));
        assert!(names.contains(&"go:kerbrute".to_string()));
        assert_eq!(names.last().map(String::as_str), Some("service:ssh"));
    }

    #[test]
    fn test_default_plan_names_are_distinct() {
        let config = Config::parse(DEFAULT_CONFIG).unwrap();
        let names = build_plan(&config, &kali()).names();
        let distinct: std::collections::HashSet<&String> = names.iter().collect();
        assert_eq!(distinct.len(), names.len());
        assert!(names.contains(&"apt_update#2".to_string()));
    }

    #[test]
    fn test_huge_max_age_builds() {
        let plan = plan_for("[[step]]\nkind = \"apt_update\"\nmax_age_hours = 9223372036854775807\n");
        assert_eq!(plan.names(), vec!["apt_update"]);
    }
}
