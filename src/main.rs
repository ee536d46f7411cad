//! fzmovies 命令行入口：搜索、榜单浏览与下载。

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Result, anyhow};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use fzmovies_downloader::base_system::config::{load_or_create, load_or_create_with_base};
use fzmovies_downloader::base_system::context::Config;
use fzmovies_downloader::base_system::logging::{LogOptions, LogSystem};
use fzmovies_downloader::download::models::{MovieSummary, SaveOutcome, SearchResultPage};
use fzmovies_downloader::network_parser::filters::{SearchBy, SearchCategory};
use fzmovies_downloader::{
    Auto, Filter, FilterKind, Quality, SaveOptions, SearchEngine, Session,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "fzmovies", version = VERSION)]
#[command(about = "Search and download movies from fzmovies.net")]
struct Cli {
    /// 启用调试日志输出
    #[arg(long, global = true, default_value_t = false)]
    debug: bool,

    /// 数据目录路径（用于存放 config.yml 和 logs）
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// 控制台不输出日志与进度条
    #[arg(long, global = true, default_value_t = false)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 按名称 / 导演 / 演员搜索
    Search {
        query: String,
        #[command(flatten)]
        search: SearchArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// 浏览站点榜单（imdb-top-250, oscars, genre, year, tag ...）
    List {
        kind: String,
        /// 榜单参数：奖项 / 字母区间 / 类型 / 年份 / 标签
        arg: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// 搜索并下载
    Download {
        query: String,
        #[command(flatten)]
        search: SearchArgs,
        #[command(flatten)]
        save: SaveArgs,
    },
}

#[derive(Debug, Args)]
struct SearchArgs {
    #[arg(short, long, default_value = "Name")]
    searchby: String,
    #[arg(short, long, default_value = "All")]
    category: String,
}

#[derive(Debug, Args)]
struct OutputArgs {
    /// 沿下一页链接聚合全部结果
    #[arg(short, long, default_value_t = false)]
    all: bool,
    /// 聚合时的影片数量下限（默认取配置）
    #[arg(short, long)]
    limit: Option<usize>,
    /// 以 JSON 输出
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Debug, Args)]
struct SaveArgs {
    /// 清晰度 480p / 720p（默认取配置）
    #[arg(short, long)]
    quality: Option<String>,
    /// 使用第几个搜索结果
    #[arg(long, default_value_t = 0)]
    movie_index: usize,
    /// 使用第几个下载地址
    #[arg(long, default_value_t = 0)]
    link_index: usize,
    #[arg(short, long)]
    dir: Option<PathBuf>,
    #[arg(short = 'o', long)]
    filename: Option<String>,
    /// 分块大小（KB，默认取配置）
    #[arg(short = 'z', long)]
    chunk_size: Option<usize>,
    /// 续传未完成的下载
    #[arg(short, long, default_value_t = false)]
    resume: bool,
    /// 跳过确认
    #[arg(short, long, default_value_t = false)]
    yes: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("> Error : {err}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let data_dir = cli.data_dir.as_deref();
    let _log = init_logging(cli.debug, cli.quiet, data_dir)?;

    let config = if let Some(dir) = data_dir {
        load_or_create_with_base::<Config>(None, Some(dir)).map_err(|e| anyhow!(e.to_string()))?
    } else {
        load_or_create::<Config>(None).map_err(|e| anyhow!(e.to_string()))?
    };
    info!(target: "startup", "当前版本: v{}", VERSION);

    let session =
        Session::new(config.session_config().map_err(|e| anyhow!(e.to_string()))?)?;

    match cli.command {
        Command::Search {
            query,
            search,
            output,
        } => {
            let filter = search_filter(&query, &search)?;
            print_results(&session, filter, &output, &config)
        }
        Command::List {
            kind,
            arg,
            category,
            output,
        } => {
            let kind: FilterKind = kind.parse()?;
            let filter = Filter::build(kind, arg.as_deref(), category.as_deref())?;
            print_results(&session, filter, &output, &config)
        }
        Command::Download {
            query,
            search,
            save,
        } => {
            let filter = search_filter(&query, &search)?;
            download(&session, filter, save, &config, !cli.quiet)
        }
    }
}

fn search_filter(query: &str, args: &SearchArgs) -> Result<Filter> {
    let searchby: SearchBy = args.searchby.parse()?;
    let category: SearchCategory = args.category.parse()?;
    Ok(Filter::search(query, searchby, category))
}

fn print_results(session: &Session, filter: Filter, output: &OutputArgs, config: &Config) -> Result<()> {
    let mut engine = SearchEngine::new(session.clone(), filter);
    let page = if output.all {
        engine.all_results(output.limit.unwrap_or(config.search_limit))?
    } else {
        engine.results()?
    };

    if output.json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }
    print_page(&page);
    Ok(())
}

fn print_page(page: &SearchResultPage) {
    for (idx, movie) in page.movies.iter().enumerate() {
        print_movie(idx, movie);
    }
    if let Some(next) = page.next_page.as_ref() {
        println!("\n下一页: {next}");
    }
}

fn print_movie(idx: usize, movie: &MovieSummary) {
    println!(
        "{:>3}. {} ({}) [{}]\n     {}",
        idx, movie.title, movie.year, movie.distribution, movie.url
    );
}

fn download(
    session: &Session,
    filter: Filter,
    args: SaveArgs,
    config: &Config,
    show_bar: bool,
) -> Result<()> {
    let quality: Quality = match args.quality.as_deref() {
        Some(q) => q.parse()?,
        None => config.quality().map_err(|e| anyhow!(e.to_string()))?,
    };

    let auto = Auto::new(session.clone(), quality, filter)?
        .movie_index(args.movie_index)?
        .link_index(args.link_index);
    let bundle = auto.resolve()?;

    let movie = auto.target();
    let filename = args.filename.unwrap_or_else(|| bundle.filename.clone());
    println!("{} ({}) - {}", movie.title, movie.year, quality);
    println!("{} [{}]", filename, bundle.size);
    if !bundle.info.is_empty() {
        println!("{}", bundle.info);
    }

    if !args.yes {
        let ans = read_line("> Continue with download? [Y/n]: ")?;
        if ans.trim().eq_ignore_ascii_case("n") {
            println!("已取消");
            return Ok(());
        }
    }

    let options = SaveOptions::new(
        args.dir.unwrap_or_else(|| config.default_save_dir()),
        filename,
    )
    .chunk_size_kb(args.chunk_size.unwrap_or(config.chunk_size_kb))
    .resume(args.resume)
    .progress_bar(show_bar);

    match auto.save(&bundle, options)? {
        SaveOutcome::Saved(path) => println!("> Saved to : {}", path.display()),
        SaveOutcome::AlreadyComplete(path) => {
            println!("> Download already complete : {}", path.display())
        }
    }
    Ok(())
}

fn read_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush().ok();
    let stdin = io::stdin();
    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    Ok(line)
}

fn init_logging(debug: bool, quiet: bool, base_dir: Option<&Path>) -> Result<LogSystem> {
    LogSystem::init_with_base(LogOptions::for_cli(debug, quiet), base_dir).map_err(|e| anyhow!(e))
}
