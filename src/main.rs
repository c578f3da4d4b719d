use anyhow::Context;
use query_deriver::{BoundQuery, DeriverConfig, QueryDescriptor, QueryDeriver};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const CONFIG_FILE: &str = "query_deriver.json";

const HELP: &str = "\
命令:
  entity <Name>          设置当前实体（默认 Person）
  <methodName>           派生方法名，例如 findByNameAndAgeGreaterThan
  text <query>           派生文本查询，例如 text name = :name and age > 18
  bind <json>, <json>... 按位置绑定上一次派生结果的参数
  cache                  显示缓存条目数
  cache clear            清空缓存
  help                   显示帮助
  quit                   退出";

/// 加载配置，失败时使用默认配置
fn load_config() -> DeriverConfig {
    match DeriverConfig::from_json_file(CONFIG_FILE) {
        Ok(config) => {
            println!("✅ 成功从JSON配置文件加载: {}", CONFIG_FILE);
            for (entity, fields) in &config.attributes {
                for (attribute, field) in fields {
                    println!("  {}.{} -> {}", entity, attribute, field);
                }
            }
            config
        }
        Err(e) => {
            println!("⚠️ 无法加载JSON配置文件 ({}), 使用默认配置", e);
            DeriverConfig::default()
        }
    }
}

struct Session {
    deriver: QueryDeriver,
    entity: String,
    last: Option<Arc<QueryDescriptor>>,
}

impl Session {
    fn handle(&mut self, line: &str) -> anyhow::Result<bool> {
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        match command {
            "quit" | "exit" => return Ok(false),
            "help" => println!("{}", HELP),
            "entity" if !rest.is_empty() => {
                self.entity = rest.to_string();
                println!("当前实体: {}", self.entity);
            }
            "cache" if rest == "clear" => {
                self.deriver.cache().clear();
                println!("缓存已清空");
            }
            "cache" => println!("缓存条目: {}", self.deriver.cache().len()),
            "text" => {
                let descriptor = self.deriver.derive_text(rest, &self.entity)?;
                self.show(descriptor)?;
            }
            "bind" => {
                let descriptor = self
                    .last
                    .clone()
                    .context("尚未派生任何查询")?;
                let args = parse_args(rest)?;
                let bound = self.deriver.bind(&descriptor, args)?;
                print_bound(&bound)?;
            }
            _ => {
                let descriptor = self.deriver.derive_method(line, &self.entity)?;
                self.show(descriptor)?;
            }
        }
        Ok(true)
    }

    fn show(&mut self, descriptor: Arc<QueryDescriptor>) -> anyhow::Result<()> {
        if let Some(condition) = &descriptor.condition {
            println!("条件: {}", condition);
        }
        println!("{}", serde_json::to_string_pretty(descriptor.as_ref())?);
        let names = descriptor.parameter_names();
        if !names.is_empty() {
            println!("参数: {}", names.join(", "));
        }
        self.last = Some(descriptor);
        Ok(())
    }
}

/// 把 `"Ada", 18, [1, 2]` 解析成 JSON 参数列表
fn parse_args(input: &str) -> anyhow::Result<Vec<Value>> {
    if input.is_empty() {
        return Ok(Vec::new());
    }
    let array: Value = serde_json::from_str(&format!("[{}]", input))
        .with_context(|| format!("无法解析参数: {}", input))?;
    match array {
        Value::Array(items) => Ok(items),
        other => Ok(vec![other]),
    }
}

fn print_bound(bound: &BoundQuery) -> anyhow::Result<()> {
    if let Some(condition) = &bound.condition {
        println!("绑定后: {}", condition);
    }
    println!("{}", serde_json::to_string_pretty(bound)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("--- Query Deriver: 方法名 / 文本查询 到条件树 ---");
    println!("\n[配置信息]:");
    let config = load_config();

    let mut session = Session {
        deriver: QueryDeriver::from_config(&config),
        entity: "Person".to_string(),
        last: None,
    };

    println!("\n输入 help 查看命令");
    let mut editor = DefaultEditor::new().context("无法初始化命令行编辑器")?;
    loop {
        match editor.readline(&format!("{}> ", session.entity)) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line)?;
                match session.handle(line) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => {
                        warn!(error = %e, "command failed");
                        println!("✗ {}", e);
                    }
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
