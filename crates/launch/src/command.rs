//! Launch command construction

use harness_core::{ClusterInfo, LaunchConfig, Result, USE_TORCH_DISTRIBUTED};
use std::fmt;
use std::process::Command;

/// A fully resolved child process invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    /// Executable to run
    pub program: String,

    /// Arguments, in order
    pub args: Vec<String>,

    /// Variables added to the child's environment
    pub env: Vec<(String, String)>,
}

impl LaunchCommand {
    /// Command handing this node off to torch.distributed.run
    ///
    /// The chief is the first container address. The argument shape is
    /// `--master_addr --master_port --rank --nnodes --module <harness>
    /// --chief-ip`, which the unmodified launcher expects.
    pub fn torch_distributed(info: &ClusterInfo, config: &LaunchConfig) -> Result<Self> {
        info.validate()?;
        let chief_ip = info.chief_addr()?.to_string();

        let mut args = config.launcher_args.clone();
        args.extend([
            "--master_addr".to_string(),
            chief_ip.clone(),
            "--master_port".to_string(),
            config.master_port.to_string(),
            "--rank".to_string(),
            info.container_rank.to_string(),
            "--nnodes".to_string(),
            info.num_nodes().to_string(),
            "--module".to_string(),
            config.harness_module.clone(),
            "--chief-ip".to_string(),
            chief_ip,
        ]);

        Ok(Self {
            program: config.launcher_program.clone(),
            args,
            env: vec![(USE_TORCH_DISTRIBUTED.to_string(), "True".to_string())],
        })
    }

    /// Value following the first occurrence of `flag`
    pub fn arg_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Value of a variable set on the child environment
    pub fn env_value(&self, name: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command.envs(self.env.iter().map(|(k, v)| (k, v)));
        command
    }
}

impl fmt::Display for LaunchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}
