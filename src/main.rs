fn main() -> anyhow::Result<()> {
    emolearn_lib::run()
}
