use clap::Parser;
use std::path::{Path, PathBuf};
use scinv_editor::{
    EditingSession, EditorConfig, FieldEdit, Inventory, InventoryDebugger, NodeId, RecordSelector,
    StageOutcome, SUPPORTED_EXTENSIONS,
};

#[derive(Parser)]
#[command(name = "scinv")]
#[command(about = "查看和编辑 SeisComP 库存 XML 文件（保留原有格式）")]
#[command(version = "0.3.0")]
struct Cli {
    /// 输入库存 XML 文件路径
    #[arg(short, long)]
    input: PathBuf,

    /// 打印记录树
    #[arg(long)]
    tree: bool,

    /// 显示库存统计信息
    #[arg(long)]
    stats: bool,

    /// 显示单个记录的所有字段，例如 GE.APE..BHZ 或 sensor:STS-2
    #[arg(long, value_name = "SELECTOR")]
    show: Option<String>,

    /// 要编辑的记录（与 --set 一起使用）
    #[arg(long, value_name = "SELECTOR")]
    record: Option<String>,

    /// 设置字段，FIELD=VALUE，可重复；空值表示删除
    #[arg(long, value_name = "FIELD=VALUE", requires = "record")]
    set: Vec<String>,

    /// 从 JSON 文件批量应用修改
    #[arg(long, value_name = "FILE")]
    apply_edits: Option<PathBuf>,

    /// 导出整个库存为 JSON
    #[arg(long, value_name = "FILE")]
    export: Option<PathBuf>,

    /// 打印带字节区间的文件结构
    #[arg(long)]
    dump: bool,

    /// 与另一个文件逐行对比
    #[arg(long, value_name = "FILE")]
    diff: Option<PathBuf>,

    /// 编辑器配置文件（JSON）
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// 日志级别（error/warn/info/debug/trace）
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// 输出详细日志与保存差异
    #[arg(short, long)]
    verbose: bool,

    /// 静默模式(仅输出错误)
    #[arg(long)]
    quiet: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let _logger = init_logging(&cli)?;
    validate_input(&cli.input)?;

    let mut config = match &cli.config {
        Some(path) => EditorConfig::load(path).map_err(|e| format!("{:#}", e))?,
        None => EditorConfig::default(),
    };
    // 命令行一次性执行，显式保存
    config.autosave = false;

    let mut session = EditingSession::new(config);
    session
        .load_document(&cli.input)
        .map_err(|e| format!("加载库存失败: {}", e))?;

    if let Some(other) = &cli.diff {
        return handle_diff(&cli, other);
    }

    if cli.dump {
        print!("{}", InventoryDebugger::dump_structure(document(&session)?)?);
        return Ok(());
    }

    if cli.stats {
        println!("{}", document(&session)?.get_stats());
        return Ok(());
    }

    if cli.tree {
        print_tree(&session, None, 0)?;
        return Ok(());
    }

    if let Some(selector) = &cli.show {
        return handle_show(&session, selector);
    }

    if let Some(export_path) = &cli.export {
        return handle_export(&cli, &session, export_path);
    }

    let mut edits = Vec::new();
    if let Some(record) = &cli.record {
        for assignment in &cli.set {
            let edit = FieldEdit::parse_assignment(record, assignment)
                .ok_or_else(|| format!("无效的赋值（应为 FIELD=VALUE）: {}", assignment))?;
            edits.push(edit);
        }
    }
    if let Some(edits_file) = &cli.apply_edits {
        edits.extend(load_edits(edits_file)?);
    }

    if edits.is_empty() {
        // 默认模式：打印统计
        println!("{}", document(&session)?.get_stats());
        return Ok(());
    }

    apply_edits(&cli, &mut session, &edits)
}

/// 初始化日志
fn init_logging(cli: &Cli) -> Result<flexi_logger::LoggerHandle, Box<dyn std::error::Error>> {
    let level = if cli.quiet {
        "error"
    } else if cli.verbose && cli.log_level == "warn" {
        "info"
    } else {
        cli.log_level.as_str()
    };
    let handle = flexi_logger::Logger::try_with_str(level)?
        .format(flexi_logger::default_format)
        .start()?;
    Ok(handle)
}

/// 验证输入文件
fn validate_input(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !input.exists() {
        return Err(format!("输入文件不存在: {:?}", input).into());
    }

    let extension = input
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    if !SUPPORTED_EXTENSIONS.iter().any(|&ext| Some(ext) == extension.as_deref()) {
        return Err("输入文件必须是 XML 文件".into());
    }

    Ok(())
}

fn document(session: &EditingSession) -> Result<&Inventory, Box<dyn std::error::Error>> {
    session.document().ok_or_else(|| "未加载文档".into())
}

/// 递归打印记录树
fn print_tree(session: &EditingSession, parent: Option<NodeId>, depth: usize) -> Result<(), Box<dyn std::error::Error>> {
    for id in session.list_children(parent)? {
        println!("{}{}", "  ".repeat(depth), session.record(id)?.label());
        print_tree(session, Some(id), depth + 1)?;
    }
    Ok(())
}

/// 显示单个记录
fn handle_show(session: &EditingSession, selector: &str) -> Result<(), Box<dyn std::error::Error>> {
    let selector: RecordSelector = selector.parse()?;
    let id = selector.resolve(document(session)?)?;
    let record = session.record(id)?;

    println!("{}", record.label());
    for spec in record.kind.fields() {
        let value = session.read_field(id, spec.name)?;
        let marker = if spec.is_editable() { "" } else { " (只读)" };
        println!("  {:<24} {}{}", spec.label, value, marker);
    }
    Ok(())
}

/// 导出 JSON
fn handle_export(cli: &Cli, session: &EditingSession, export_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let json = document(session)?
        .export_json()
        .map_err(|e| format!("序列化JSON失败: {}", e))?;
    std::fs::write(export_path, json).map_err(|e| format!("写入文件失败: {}", e))?;

    if !cli.quiet {
        println!("结果已写入: {:?}", export_path);
    }
    Ok(())
}

/// 加载批量修改文件
fn load_edits(edits_file: &Path) -> Result<Vec<FieldEdit>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(edits_file)
        .map_err(|e| format!("读取修改文件失败: {}", e))?;
    FieldEdit::list_from_json(&content).map_err(|e| format!("解析修改文件失败: {}", e).into())
}

/// 暂存所有修改并保存
fn apply_edits(cli: &Cli, session: &mut EditingSession, edits: &[FieldEdit]) -> Result<(), Box<dyn std::error::Error>> {
    for edit in edits {
        let selector: RecordSelector = edit.record.parse()?;
        let id = selector.resolve(document(session)?)?;
        let outcome = session
            .stage_field_change(id, &edit.field, &edit.value)
            .map_err(|e| format!("{} {}: {}", edit.record, edit.field, e))?;

        if !cli.quiet {
            match outcome {
                StageOutcome::Staged => println!("{} {} = \"{}\"", edit.record, edit.field, edit.value),
                StageOutcome::Unchanged => println!("{} {} 未变化", edit.record, edit.field),
            }
        }
    }

    if !session.has_unsaved_changes() {
        if !cli.quiet {
            println!("没有需要保存的修改");
        }
        return Ok(());
    }

    let report = session
        .save_to_original()
        .map_err(|e| format!("保存失败: {}", e))?;

    if !cli.quiet {
        println!(
            "已保存 {:?}: {} 个记录, {} 个字段 (备份: {:?})",
            report.path, report.records_patched, report.fields_written, report.backup_path
        );
    }
    if cli.verbose {
        let before = std::fs::read(&report.backup_path)?;
        let after = std::fs::read(&report.path)?;
        print!("{}", InventoryDebugger::diff_report(&before, &after));
    }
    Ok(())
}

/// 处理文件对比
fn handle_diff(cli: &Cli, other: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !other.exists() {
        return Err(format!("对比文件不存在: {:?}", other).into());
    }
    if !cli.quiet {
        println!("正在对比:");
        println!("  文件1: {:?}", cli.input);
        println!("  文件2: {:?}", other);
    }

    let before = std::fs::read(&cli.input)?;
    let after = std::fs::read(other)?;
    print!("{}", InventoryDebugger::diff_report(&before, &after));
    Ok(())
}
