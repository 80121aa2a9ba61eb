use simos_core::{console_log, Console};

fn main() {
    let mut console = Console::new();
    for line in console.run_command("run copy2ax 10; add2ax 5; mul2ax 2; sub2ax 4; div2ax 2; halt").lines {
        println!("{}", line);
    }
    for record in console.drain_log() {
        console_log!("{}", record);
    }
    println!("CLI Result: {}", console.snapshot().ax);
}
