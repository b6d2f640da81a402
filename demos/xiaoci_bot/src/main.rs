//! Xiaoci demo bot.
//!
//! | Trigger | Route | Reply |
//! |---------|-------|-------|
//! | `测试`, `你好` | command | `成功` |
//! | `帮助` / `help` / `菜单` | command | command list |
//! | `发送 <text>` | regex | `<text>` |
//! | `清除缓存` | command | clears the dedup cache |
//! | `结束` / `退出` | command | stops the bot |
//! | any card | global | the card JSON |
//!
//! # Usage
//!
//! ```bash
//! cargo run --package xiaoci-bot -- --config xiaoci.toml
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use xiaoci::prelude::*;

/// Longest card dump sent back, in characters.
const CARD_DUMP_CHARS: usize = 2000;

const HELP_TEXT: &str = "指令列表：
📝 测试 - 测试指令
❓ 帮助/help/菜单 - 查看帮助
✉️ 发送 <内容> - 复读内容
🧹 清除缓存 - 清空去重缓存";

#[derive(Parser, Debug)]
#[command(name = "xiaoci-bot", about = "Xiaoci demo bot")]
struct Args {
    /// Config file; searched in the current directory when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Config profile, e.g. production
    #[arg(short, long)]
    profile: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn success(ctx: HandlerContext) -> HandlerResult {
    ctx.reply("成功").await?;
    Ok(())
}

async fn help(ctx: HandlerContext) -> HandlerResult {
    ctx.reply(HELP_TEXT).await?;
    Ok(())
}

async fn echo(ctx: HandlerContext) -> HandlerResult {
    let Some(content) = ctx.group(1) else {
        return Ok(());
    };
    ctx.reply(content).await?;
    Ok(())
}

/// Sees every unrouted message but only answers cards.
async fn card_dump(ctx: HandlerContext) -> HandlerResult {
    if ctx.msg_type != MsgType::Card {
        return Ok(());
    }
    let Some(card) = &ctx.card else {
        return Ok(());
    };

    let mut dump = serde_json::to_string_pretty(card)?;
    if dump.chars().count() > CARD_DUMP_CHARS {
        dump = truncate_chars(&dump, CARD_DUMP_CHARS) + "\n\n（内容过长，已截断）";
    }
    ctx.reply(format!("检测到卡片消息：\n{dump}")).await?;
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = XiaociRuntime::builder();
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = &args.profile {
        builder = builder.profile(profile);
    }
    let runtime = builder.build()?;

    runtime.on_event("测试").bind(success);
    runtime.on_event("你好").bind(success);
    runtime.on_event(["帮助", "help", "菜单"]).bind(help);
    runtime.on_event(r"发送 ([\s\S]+)").bind(echo);

    let admin = runtime.admin();
    runtime.on_event("清除缓存").bind(move |ctx: HandlerContext| {
        let admin = admin.clone();
        async move {
            let dropped = admin.dedup_len();
            admin.clear_dedup_cache();
            ctx.reply(format!("已清除 {dropped} 条去重记录")).await?;
            anyhow::Ok(())
        }
    });

    let admin = runtime.admin();
    runtime.on_event(["结束", "退出"]).bind(move |ctx: HandlerContext| {
        let admin = admin.clone();
        async move {
            ctx.reply("已退出").await?;
            admin.shutdown();
            anyhow::Ok(())
        }
    });

    runtime.on_any().bind(card_dump);

    runtime.run().await?;
    info!("Bye");
    Ok(())
}
