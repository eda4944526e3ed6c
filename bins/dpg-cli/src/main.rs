//! dpg-cli - DPG 视频封装命令行工具
//!
//! 将已编码的 MPEG-1 视频与 MP2 音频封装为 Moonshell 使用的 DPG0 ~ DPG4 文件,
//! 并可查看已有 DPG 文件的头部信息.

mod capture;
mod convert;
mod logging;
mod probe;

use clap::{Parser, Subcommand};
use std::process;

#[derive(Parser, Debug)]
#[command(name = "dpg-cli", version, about = "DPG 视频封装工具")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// 日志级别 (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// 静默模式 (只输出结果)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 封装视频/音频基本流为 DPG 文件
    Convert(convert::ConvertArgs),
    /// 显示 DPG 文件信息
    Probe(probe::ProbeArgs),
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = logging::init("dpg-cli", cli.verbose, cli.quiet) {
        eprintln!("警告: 日志初始化失败: {e:#}");
    }

    if !cli.quiet {
        eprintln!("dpg-cli 版本 {} -- DPG 视频封装工具", dpgconv::version());
    }

    let code = match &cli.command {
        Command::Convert(args) => match convert::run(args) {
            Ok(0) => 0,
            Ok(failed) => {
                eprintln!("错误: {failed} 个文件转换失败");
                1
            }
            Err(e) => {
                eprintln!("错误: {e:#}");
                1
            }
        },
        Command::Probe(args) => match probe::run(args) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("错误: {e:#}");
                1
            }
        },
    };
    process::exit(code);
}
