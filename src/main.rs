fn main() -> anyhow::Result<()> {
    backvault::cli::run()
}
