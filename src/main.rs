use anyhow::Result;
use clap::{Parser, Subcommand};
use plan_validator::utils::logging;
use plan_validator::{Answer, App, Config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "plan_validator", version, about = "建筑平面图是非题校验")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// 显示 debug 日志
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// 启动校验服务（默认）
    Serve {
        /// 监听地址，覆盖 LISTEN_ADDR
        #[arg(short, long)]
        listen: Option<String>,
    },
    /// 在终端中完成一次提交
    Submit {
        /// 平面图 PDF
        pdf: PathBuf,
        /// 按问题顺序给出的答案，例如 yes,no,yes；缺少的会在终端询问
        #[arg(short, long, value_delimiter = ',')]
        answers: Vec<Answer>,
        /// 校验服务地址，覆盖 SERVER_URL
        #[arg(short, long)]
        server: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let mut config = Config::from_env();

    // 初始化日志
    logging::init(cli.verbose || config.verbose_logging);

    match cli.command.unwrap_or(Command::Serve { listen: None }) {
        Command::Serve { listen } => {
            if let Some(listen) = listen {
                config.listen_addr = listen;
            }
            App::initialize(config).await?.serve().await?;
        }
        Command::Submit {
            pdf,
            answers,
            server,
        } => {
            if let Some(server) = server {
                config.server_url = server;
            }
            App::initialize(config).await?.submit(&pdf, &answers).await?;
        }
    }

    Ok(())
}
