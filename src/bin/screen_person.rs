/// 屏幕人物检测叠加层 (Screen Person Overlay)
///
/// 系统架构:
/// 1. 采集线程: 抓屏 → YOLO 人物检测 (独立工作线程)
/// 2. 主线程:   透明置顶窗口, 画出检测框 (macroquad 事件循环)
/// 3. 信号:     Ctrl+C / SIGTERM 与 Esc、关闭窗口走同一条停止路径
use std::cell::RefCell;
use std::rc::Rc;

use clap::Parser;
use macroquad::prelude::next_frame;
use macroquad::Window;
use mimalloc::MiMalloc;
use screen_person_rs::app::{install_signal_handler, AppContext, AppController};
use screen_person_rs::detection::PersonDetector;
use screen_person_rs::error::StartupError;
use screen_person_rs::input::{primary_monitor, DesktopSource};
use screen_person_rs::logging;
use screen_person_rs::models::yolov8::YOLOv8Config;
use screen_person_rs::renderer::{window_conf, MacroquadBackend};
use screen_person_rs::{Args, Model, YOLOv8};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn run(args: Args) -> Result<(), StartupError> {
    args.validate()?;
    let monitor = primary_monitor()?;

    if args.verbose {
        println!("🚀 屏幕人物检测启动");
        println!("📦 检测模型: {}", args.model.display());
        println!(
            "🖥️ 主显示器: {}x{} @ ({}, {})",
            monitor.width, monitor.height, monitor.x, monitor.y
        );
    }

    let model = YOLOv8::new(YOLOv8Config {
        model: args.model.clone(),
        ep: args.execution_provider(),
        inf_size: args.inf_size,
        profile: args.verbose,
    })
    .map_err(|e| StartupError::Backend(format!("{:#}", e)))?;
    if args.verbose {
        model.summary();
    }
    let detector = PersonDetector::new(model, args.iou);

    let ctx = AppContext::new(args.join_timeout());
    install_signal_handler(ctx.clone())?;
    println!("按 Ctrl+C 或 Esc 键停止检测");

    let loop_config = args.loop_config();
    let queue = args.queue;
    let verbose = args.verbose;
    let failure: Rc<RefCell<Option<StartupError>>> = Rc::new(RefCell::new(None));
    let failure_slot = failure.clone();

    // ========== 主线程: 叠加层事件循环 ==========
    Window::from_config(window_conf(&monitor), async move {
        let mut controller = AppController::new(ctx, MacroquadBackend::default());
        if let Err(e) = controller.start(
            &monitor,
            DesktopSource::open_primary,
            detector,
            loop_config,
            queue,
        ) {
            controller.stop();
            *failure_slot.borrow_mut() = Some(e);
            return;
        }

        while controller.tick() {
            next_frame().await;
        }
        controller.stop();
        next_frame().await;

        if verbose {
            println!("检测已停止");
        }
    });

    let failed = failure.borrow_mut().take();
    match failed {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn main() {
    let args = Args::parse();
    logging::init(args.verbose);

    if let Err(e) = run(args) {
        println!("程序启动失败: {}", e);
        println!("请确保已正确安装所有依赖项并配置好环境");
        std::process::exit(1);
    }
}
